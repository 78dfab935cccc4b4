//! The grammar: terminal alphabet, productions, precedence.
//!
//! Encoded as data and handed to the LALR(1) builder in [`crate::lalr`].
//! The precedence table is the language's operator table (lowest binding
//! `?` up to `::`/indexing); three pseudo-terminals exist only to give
//! the unary-operator and function productions their `%prec` overrides.

use rye_lex::TokenKind;

use crate::lalr::{Assoc, GrammarDef, PrecEntry, Production, Sym};

/// Real terminals in table order.
pub(crate) const TERMINALS: &[TokenKind] = &[
    TokenKind::EndOfInput,
    TokenKind::Error,
    TokenKind::StrConst,
    TokenKind::NumConst,
    TokenKind::NullConst,
    TokenKind::Placeholder,
    TokenKind::Symbol,
    TokenKind::Function,
    TokenKind::Lambda,
    TokenKind::For,
    TokenKind::In,
    TokenKind::If,
    TokenKind::Else,
    TokenKind::While,
    TokenKind::Next,
    TokenKind::Break,
    TokenKind::Repeat,
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Star,
    TokenKind::Div,
    TokenKind::Caret,
    TokenKind::Lt,
    TokenKind::Le,
    TokenKind::Gt,
    TokenKind::Ge,
    TokenKind::Eq2,
    TokenKind::Ne,
    TokenKind::And,
    TokenKind::And2,
    TokenKind::Or,
    TokenKind::Or2,
    TokenKind::Not,
    TokenKind::LeftAssign,
    TokenKind::SuperAssign,
    TokenKind::RightAssign,
    TokenKind::SuperRightAssign,
    TokenKind::EqAssign,
    TokenKind::Tilde,
    TokenKind::Question,
    TokenKind::Colon,
    TokenKind::Dollar,
    TokenKind::At,
    TokenKind::NsGet,
    TokenKind::NsGetInt,
    TokenKind::Special,
    TokenKind::Pipe,
    TokenKind::PipeBind,
    TokenKind::Newline,
    TokenKind::Semicolon,
    TokenKind::Comma,
    TokenKind::LParen,
    TokenKind::RParen,
    TokenKind::LBrace,
    TokenKind::RBrace,
    TokenKind::LBracket,
    TokenKind::Lbb,
    TokenKind::RBracket,
];

/// Number of real terminals.
pub(crate) const N_TERMINALS: usize = TERMINALS.len();

// pseudo-terminals carrying precedence only
pub(crate) const P_LOW: usize = N_TERMINALS;
pub(crate) const P_UNOT: usize = N_TERMINALS + 1;
pub(crate) const P_UMINUS: usize = N_TERMINALS + 2;

/// Synthetic end-of-parse marker used by the table builder.
pub(crate) const EOF_MARK: usize = N_TERMINALS + 3;

/// Terminal index of a token kind (diagnostic-only kinds never reach the
/// tables).
pub(crate) fn term_index(kind: TokenKind) -> usize {
    TERMINALS
        .iter()
        .position(|&k| k == kind)
        .unwrap_or_else(|| panic!("token kind {:?} is not a parser terminal", kind))
}

// nonterminal ids
pub(crate) const NT_ACCEPT: Sym = (EOF_MARK + 1) as Sym;
pub(crate) const NT_PROG: Sym = NT_ACCEPT + 1;
pub(crate) const NT_EOAH: Sym = NT_ACCEPT + 2; // expr_or_assign_or_help
pub(crate) const NT_EOH: Sym = NT_ACCEPT + 3; // expr_or_help
pub(crate) const NT_EXPR: Sym = NT_ACCEPT + 4;
pub(crate) const NT_COND: Sym = NT_ACCEPT + 5;
pub(crate) const NT_IFCOND: Sym = NT_ACCEPT + 6;
pub(crate) const NT_FORCOND: Sym = NT_ACCEPT + 7;
pub(crate) const NT_EXPRLIST: Sym = NT_ACCEPT + 8;
pub(crate) const NT_SUBLIST: Sym = NT_ACCEPT + 9;
pub(crate) const NT_SUB: Sym = NT_ACCEPT + 10;
pub(crate) const NT_FORMLIST: Sym = NT_ACCEPT + 11;
pub(crate) const NT_CR: Sym = NT_ACCEPT + 12;

pub(crate) const N_SYMBOLS: usize = NT_CR as usize + 1;

/// Which tag form a named argument used.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum TagKind {
    Symbol,
    Str,
    Null,
}

/// Semantic action attached to each production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Act {
    /// Augmented start; never reduced.
    Start,
    ProgEof,
    ProgNull,
    ProgExpr,
    /// `$$ = $1`
    First,
    /// `$$ = ($2, $1, $3)`
    Binary,
    /// `$$ = ($1, $2)`
    Unary,
    /// `( e )` keeps its call wrapper
    Paren,
    /// `{ exprlist }`
    Block,
    FunCall,
    Function,
    If,
    IfElse,
    For,
    While,
    Repeat,
    /// `e [ sublist ]` / `e [[ sublist ]]`
    Subscript {
        double: bool,
    },
    Namespace,
    /// `e $ name` / `e @ name`
    DollarAt,
    /// `e -> v` rewrites to the normal assignment with reversed operands
    RightAssign,
    Pipe,
    PipeBind,
    NextBreak,
    CondPass,
    ForCond,
    ExprlistEmpty,
    ExprlistOne,
    ExprlistAdd,
    ExprlistSame,
    SublistOne,
    SublistAdd,
    SubEmpty,
    SubExpr,
    SubTagged {
        tag: TagKind,
        has_value: bool,
    },
    FormlistEmpty,
    FormlistOne {
        default: bool,
    },
    FormlistAdd {
        default: bool,
    },
    Cr,
}

/// The grammar plus its per-production actions.
pub(crate) struct Grammar {
    pub def: GrammarDef,
    pub acts: Vec<Act>,
}

fn prec_table() -> Vec<Option<PrecEntry>> {
    use TokenKind::*;
    let mut prec: Vec<Option<PrecEntry>> = vec![None; EOF_MARK + 1];
    let mut set = |kinds: &[TokenKind], level: u8, assoc: Assoc| {
        for &k in kinds {
            prec[term_index(k)] = Some(PrecEntry { level, assoc });
        }
    };
    set(&[Question], 1, Assoc::Left);
    set(&[While, For, Repeat], 2, Assoc::Left);
    set(&[If], 3, Assoc::Right);
    set(&[Else], 4, Assoc::Left);
    set(&[LeftAssign, SuperAssign], 5, Assoc::Right);
    set(&[EqAssign], 6, Assoc::Right);
    set(&[RightAssign, SuperRightAssign], 7, Assoc::Left);
    set(&[Tilde], 8, Assoc::Left);
    set(&[Or, Or2], 9, Assoc::Left);
    set(&[And, And2], 10, Assoc::Left);
    set(&[Not], 11, Assoc::Left);
    set(&[Gt, Ge, Lt, Le, Eq2, Ne], 12, Assoc::NonAssoc);
    set(&[Plus, Minus], 13, Assoc::Left);
    set(&[Star, Div], 14, Assoc::Left);
    set(&[Special, Pipe], 15, Assoc::Left);
    set(&[PipeBind], 16, Assoc::Left);
    set(&[Colon], 17, Assoc::Left);
    // 18: unary minus/plus (pseudo-terminal below)
    set(&[Caret], 19, Assoc::Right);
    set(&[Dollar, At], 20, Assoc::Left);
    set(&[NsGet, NsGetInt], 21, Assoc::Left);
    set(&[LParen, LBracket, Lbb], 22, Assoc::NonAssoc);

    prec[P_LOW] = Some(PrecEntry {
        level: 2,
        assoc: Assoc::Left,
    });
    prec[P_UNOT] = Some(PrecEntry {
        level: 11,
        assoc: Assoc::Left,
    });
    prec[P_UMINUS] = Some(PrecEntry {
        level: 18,
        assoc: Assoc::Left,
    });
    prec
}

/// Build the grammar. Called once; the tables are cached by the driver.
pub(crate) fn grammar() -> Grammar {
    use TokenKind::*;
    let prec = prec_table();

    let t = |k: TokenKind| term_index(k) as Sym;
    let mut productions: Vec<Production> = Vec::new();
    let mut acts: Vec<Act> = Vec::new();

    // one production; prec_of names either a terminal or pseudo-terminal
    let mut add = |lhs: Sym, rhs: Vec<Sym>, prec_override: Option<usize>, act: Act| {
        let p = match prec_override {
            Some(idx) => prec[idx],
            None => rhs
                .iter()
                .rev()
                .find(|s| (**s as usize) < N_TERMINALS)
                .and_then(|s| prec[*s as usize]),
        };
        productions.push(Production {
            lhs,
            rhs,
            prec: p,
        });
        acts.push(act);
    };

    add(NT_ACCEPT, vec![NT_PROG], None, Act::Start);

    // prog
    add(NT_PROG, vec![t(EndOfInput)], None, Act::ProgEof);
    add(NT_PROG, vec![t(Newline)], None, Act::ProgNull);
    add(NT_PROG, vec![NT_EOAH, t(Newline)], None, Act::ProgExpr);
    add(NT_PROG, vec![NT_EOAH, t(Semicolon)], None, Act::ProgExpr);

    // expr_or_assign_or_help
    add(NT_EOAH, vec![NT_EXPR], None, Act::First);
    add(NT_EOAH, vec![NT_EOAH, t(EqAssign), NT_EOAH], None, Act::Binary);
    add(NT_EOAH, vec![NT_EOAH, t(Question), NT_EOAH], None, Act::Binary);

    // expr_or_help
    add(NT_EOH, vec![NT_EXPR], None, Act::First);
    add(NT_EOH, vec![NT_EOH, t(Question), NT_EOH], None, Act::Binary);

    // literals and names
    add(NT_EXPR, vec![t(NumConst)], None, Act::First);
    add(NT_EXPR, vec![t(StrConst)], None, Act::First);
    add(NT_EXPR, vec![t(NullConst)], None, Act::First);
    add(NT_EXPR, vec![t(Placeholder)], None, Act::First);
    add(NT_EXPR, vec![t(Symbol)], None, Act::First);

    // grouping
    add(
        NT_EXPR,
        vec![t(LBrace), NT_EXPRLIST, t(RBrace)],
        None,
        Act::Block,
    );
    add(
        NT_EXPR,
        vec![t(LParen), NT_EOAH, t(RParen)],
        None,
        Act::Paren,
    );

    // unary operators
    add(NT_EXPR, vec![t(Minus), NT_EXPR], Some(P_UMINUS), Act::Unary);
    add(NT_EXPR, vec![t(Plus), NT_EXPR], Some(P_UMINUS), Act::Unary);
    add(NT_EXPR, vec![t(Not), NT_EXPR], Some(P_UNOT), Act::Unary);
    add(
        NT_EXPR,
        vec![t(Tilde), NT_EXPR],
        Some(term_index(Tilde)),
        Act::Unary,
    );
    add(NT_EXPR, vec![t(Question), NT_EXPR], None, Act::Unary);

    // binary operators
    for op in [
        Colon, Plus, Minus, Star, Div, Caret, Special, Tilde, Lt, Le, Gt, Ge, Eq2, Ne, And, And2,
        Or, Or2,
    ] {
        add(NT_EXPR, vec![NT_EXPR, t(op), NT_EXPR], None, Act::Binary);
    }
    add(NT_EXPR, vec![NT_EXPR, t(Pipe), NT_EXPR], None, Act::Pipe);
    add(
        NT_EXPR,
        vec![NT_EXPR, t(PipeBind), NT_EXPR],
        None,
        Act::PipeBind,
    );

    // assignment
    add(
        NT_EXPR,
        vec![NT_EXPR, t(LeftAssign), NT_EXPR],
        None,
        Act::Binary,
    );
    add(
        NT_EXPR,
        vec![NT_EXPR, t(SuperAssign), NT_EXPR],
        None,
        Act::Binary,
    );
    add(
        NT_EXPR,
        vec![NT_EXPR, t(RightAssign), NT_EXPR],
        None,
        Act::RightAssign,
    );
    add(
        NT_EXPR,
        vec![NT_EXPR, t(SuperRightAssign), NT_EXPR],
        None,
        Act::RightAssign,
    );

    // function definitions (both spellings share the semantic action)
    add(
        NT_EXPR,
        vec![
            t(Function),
            t(LParen),
            NT_FORMLIST,
            t(RParen),
            NT_CR,
            NT_EOAH,
        ],
        Some(P_LOW),
        Act::Function,
    );
    add(
        NT_EXPR,
        vec![
            t(Lambda),
            t(LParen),
            NT_FORMLIST,
            t(RParen),
            NT_CR,
            NT_EOAH,
        ],
        Some(P_LOW),
        Act::Function,
    );

    // calls and control flow
    add(
        NT_EXPR,
        vec![NT_EXPR, t(LParen), NT_SUBLIST, t(RParen)],
        None,
        Act::FunCall,
    );
    add(NT_EXPR, vec![t(If), NT_IFCOND, NT_EOAH], None, Act::If);
    add(
        NT_EXPR,
        vec![t(If), NT_IFCOND, NT_EOAH, t(Else), NT_EOAH],
        None,
        Act::IfElse,
    );
    add(
        NT_EXPR,
        vec![t(For), NT_FORCOND, NT_EOAH],
        Some(term_index(For)),
        Act::For,
    );
    add(NT_EXPR, vec![t(While), NT_COND, NT_EOAH], None, Act::While);
    add(NT_EXPR, vec![t(Repeat), NT_EOAH], None, Act::Repeat);

    // indexing
    add(
        NT_EXPR,
        vec![NT_EXPR, t(Lbb), NT_SUBLIST, t(RBracket), t(RBracket)],
        None,
        Act::Subscript { double: true },
    );
    add(
        NT_EXPR,
        vec![NT_EXPR, t(LBracket), NT_SUBLIST, t(RBracket)],
        None,
        Act::Subscript { double: false },
    );

    // namespace access
    for ns in [NsGet, NsGetInt] {
        for lhs in [Symbol, StrConst] {
            for rhs in [Symbol, StrConst] {
                add(
                    NT_EXPR,
                    vec![t(lhs), t(ns), t(rhs)],
                    None,
                    Act::Namespace,
                );
            }
        }
    }

    // component access
    for rhs in [Symbol, StrConst] {
        add(
            NT_EXPR,
            vec![NT_EXPR, t(Dollar), t(rhs)],
            None,
            Act::DollarAt,
        );
    }
    for rhs in [Symbol, StrConst] {
        add(NT_EXPR, vec![NT_EXPR, t(At), t(rhs)], None, Act::DollarAt);
    }

    add(NT_EXPR, vec![t(Next)], None, Act::NextBreak);
    add(NT_EXPR, vec![t(Break)], None, Act::NextBreak);

    // conditions
    add(
        NT_COND,
        vec![t(LParen), NT_EOH, t(RParen)],
        None,
        Act::CondPass,
    );
    add(
        NT_IFCOND,
        vec![t(LParen), NT_EOH, t(RParen)],
        None,
        Act::CondPass,
    );
    add(
        NT_FORCOND,
        vec![t(LParen), t(Symbol), t(In), NT_EOH, t(RParen)],
        None,
        Act::ForCond,
    );

    // exprlist
    add(NT_EXPRLIST, vec![], None, Act::ExprlistEmpty);
    add(NT_EXPRLIST, vec![NT_EOAH], None, Act::ExprlistOne);
    add(
        NT_EXPRLIST,
        vec![NT_EXPRLIST, t(Semicolon), NT_EOAH],
        None,
        Act::ExprlistAdd,
    );
    add(
        NT_EXPRLIST,
        vec![NT_EXPRLIST, t(Semicolon)],
        None,
        Act::ExprlistSame,
    );
    add(
        NT_EXPRLIST,
        vec![NT_EXPRLIST, t(Newline), NT_EOAH],
        None,
        Act::ExprlistAdd,
    );
    add(
        NT_EXPRLIST,
        vec![NT_EXPRLIST, t(Newline)],
        None,
        Act::ExprlistSame,
    );

    // argument lists
    add(NT_SUBLIST, vec![NT_SUB], None, Act::SublistOne);
    add(
        NT_SUBLIST,
        vec![NT_SUBLIST, NT_CR, t(Comma), NT_SUB],
        None,
        Act::SublistAdd,
    );
    add(NT_SUB, vec![], None, Act::SubEmpty);
    add(NT_SUB, vec![NT_EOH], None, Act::SubExpr);
    for (tag_term, tag) in [(Symbol, TagKind::Symbol), (StrConst, TagKind::Str), (NullConst, TagKind::Null)] {
        add(
            NT_SUB,
            vec![t(tag_term), t(EqAssign)],
            None,
            Act::SubTagged {
                tag,
                has_value: false,
            },
        );
        add(
            NT_SUB,
            vec![t(tag_term), t(EqAssign), NT_EOH],
            None,
            Act::SubTagged {
                tag,
                has_value: true,
            },
        );
    }

    // formal arguments
    add(NT_FORMLIST, vec![], None, Act::FormlistEmpty);
    add(
        NT_FORMLIST,
        vec![t(Symbol)],
        None,
        Act::FormlistOne { default: false },
    );
    add(
        NT_FORMLIST,
        vec![t(Symbol), t(EqAssign), NT_EOH],
        None,
        Act::FormlistOne { default: true },
    );
    add(
        NT_FORMLIST,
        vec![NT_FORMLIST, t(Comma), t(Symbol)],
        None,
        Act::FormlistAdd { default: false },
    );
    add(
        NT_FORMLIST,
        vec![NT_FORMLIST, t(Comma), t(Symbol), t(EqAssign), NT_EOH],
        None,
        Act::FormlistAdd { default: true },
    );

    // cr: empty marker whose reduction turns newline-eating on
    add(NT_CR, vec![], None, Act::Cr);

    Grammar {
        def: GrammarDef {
            n_terminals: N_TERMINALS,
            eof_mark: EOF_MARK,
            n_symbols: N_SYMBOLS,
            productions,
            prec,
        },
        acts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_indices_are_dense() {
        for (i, &k) in TERMINALS.iter().enumerate() {
            assert_eq!(term_index(k), i);
        }
    }

    #[test]
    fn test_grammar_builds_tables() {
        let g = grammar();
        assert_eq!(g.def.productions.len(), g.acts.len());
        let tables = crate::lalr::build_tables(&g.def);
        assert!(tables.action.len() > 50);
        // the state after shifting a statement terminator reduces by
        // default, so a statement is accepted without extra lookahead
        assert!(tables.default_reduce.iter().any(|d| d.is_some()));
    }

    #[test]
    fn test_prec_well_formed() {
        let prec = prec_table();
        assert!(prec[term_index(TokenKind::Question)].unwrap().level
            < prec[term_index(TokenKind::Plus)].unwrap().level);
        assert!(prec[term_index(TokenKind::Plus)].unwrap().level
            < prec[term_index(TokenKind::Star)].unwrap().level);
        assert!(prec[term_index(TokenKind::Star)].unwrap().level
            < prec[term_index(TokenKind::Caret)].unwrap().level);
        assert_eq!(prec[term_index(TokenKind::Caret)].unwrap().assoc, Assoc::Right);
    }
}
