//! LALR(1) table construction.
//!
//! The parser is a shift-reduce LALR(1) driver; its action and goto
//! tables are computed here, once, from the grammar definition. The
//! construction is the classic one: the LR(0) automaton, lookaheads by
//! spontaneous generation and propagation from kernel items, and
//! yacc-style conflict resolution over the declared operator precedence
//! (shift/reduce by precedence and associativity with shift as the
//! fallback, reduce/reduce by production order).
//!
//! Lookahead sets are `u128` bitmasks, which comfortably covers the
//! terminal alphabet plus the synthetic end marker.

use rustc_hash::FxHashMap;

/// Grammar symbol: terminals first, then nonterminals.
pub(crate) type Sym = u16;

/// Operator associativity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Assoc {
    Left,
    Right,
    NonAssoc,
}

/// Precedence level (higher binds tighter) and associativity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct PrecEntry {
    pub level: u8,
    pub assoc: Assoc,
}

/// One production; `prec` is the explicit `%prec` override or the
/// precedence of the last terminal in the right-hand side.
#[derive(Debug)]
pub(crate) struct Production {
    pub lhs: Sym,
    pub rhs: Vec<Sym>,
    pub prec: Option<PrecEntry>,
}

/// The grammar handed to the table builder. Production 0 must be the
/// augmented start `S' -> start`.
pub(crate) struct GrammarDef {
    /// Number of real terminals (indices `0..n_terminals`); the slot at
    /// `eof_mark` is the synthetic end-of-parse marker.
    pub n_terminals: usize,
    pub eof_mark: usize,
    pub n_symbols: usize,
    pub productions: Vec<Production>,
    /// Per-terminal precedence, indexed up to `eof_mark`.
    pub prec: Vec<Option<PrecEntry>>,
}

/// Parser action for one (state, terminal) pair.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Action {
    Shift(u32),
    Reduce(u32),
    Err,
}

/// The computed tables.
pub(crate) struct ParseTables {
    pub action: Vec<Vec<Action>>,
    pub goto_: Vec<Vec<Option<u32>>>,
    /// Reduction to apply without consulting the lookahead, for states
    /// whose every action is that same reduction. This is what lets the
    /// driver accept a statement without reading past its terminator.
    pub default_reduce: Vec<Option<u32>>,
}

type Lookahead = u128;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
struct Item {
    prod: u32,
    dot: u32,
}

pub(crate) fn build_tables(g: &GrammarDef) -> ParseTables {
    let first = FirstSets::compute(g);

    // --- LR(0) canonical collection over kernel item sets ---
    let mut kernels: Vec<Vec<Item>> = vec![vec![Item { prod: 0, dot: 0 }]];
    let mut kernel_index: FxHashMap<Vec<Item>, u32> = FxHashMap::default();
    kernel_index.insert(kernels[0].clone(), 0);
    let mut transitions: FxHashMap<(u32, Sym), u32> = FxHashMap::default();

    let mut work = 0usize;
    while work < kernels.len() {
        let state = work as u32;
        let closure = lr0_closure(g, &kernels[work]);
        work += 1;

        // group by the symbol after the dot
        let mut moves: FxHashMap<Sym, Vec<Item>> = FxHashMap::default();
        for item in &closure {
            let rhs = &g.productions[item.prod as usize].rhs;
            if (item.dot as usize) < rhs.len() {
                let sym = rhs[item.dot as usize];
                moves.entry(sym).or_default().push(Item {
                    prod: item.prod,
                    dot: item.dot + 1,
                });
            }
        }
        let mut syms: Vec<Sym> = moves.keys().copied().collect();
        syms.sort_unstable();
        for sym in syms {
            let mut kernel = moves.remove(&sym).unwrap_or_default();
            kernel.sort_unstable();
            kernel.dedup();
            let target = match kernel_index.get(&kernel) {
                Some(&t) => t,
                None => {
                    let t = kernels.len() as u32;
                    kernels.push(kernel.clone());
                    kernel_index.insert(kernel, t);
                    t
                }
            };
            transitions.insert((state, sym), target);
        }
    }

    // --- LALR lookaheads: spontaneous generation and propagation ---
    let n_states = kernels.len();
    let mut lookaheads: Vec<Vec<Lookahead>> = kernels
        .iter()
        .map(|k| vec![0 as Lookahead; k.len()])
        .collect();
    lookaheads[0][0] |= 1 << g.eof_mark;

    // propagation links: (state, kernel idx) -> (state, kernel idx)
    let mut links: Vec<((u32, usize), (u32, usize))> = Vec::new();
    let hash_mark = g.n_symbols; // synthetic "#" lookahead

    for (state, kernel) in kernels.iter().enumerate() {
        for (ki, &item) in kernel.iter().enumerate() {
            // LR(1) closure of [item, #]
            let seeded = lr1_closure(g, &first, &[(item, hash_mark as u32)]);
            for &(cl_item, la) in &seeded {
                let rhs = &g.productions[cl_item.prod as usize].rhs;
                if (cl_item.dot as usize) >= rhs.len() {
                    continue;
                }
                let sym = rhs[cl_item.dot as usize];
                let target = transitions[&(state as u32, sym)];
                let advanced = Item {
                    prod: cl_item.prod,
                    dot: cl_item.dot + 1,
                };
                let ti = kernels[target as usize]
                    .iter()
                    .position(|&i| i == advanced)
                    .expect("goto target misses advanced kernel item");
                if la as usize == hash_mark {
                    links.push(((state as u32, ki), (target, ti)));
                } else {
                    lookaheads[target as usize][ti] |= 1 << la;
                }
            }
        }
    }

    // iterate propagation to a fixpoint
    let mut changed = true;
    while changed {
        changed = false;
        for &((fs, fi), (ts, ti)) in &links {
            let from = lookaheads[fs as usize][fi];
            let into = &mut lookaheads[ts as usize][ti];
            if from | *into != *into {
                *into |= from;
                changed = true;
            }
        }
    }

    // --- table construction with conflict resolution ---
    let n_cols = g.eof_mark + 1;
    let n_nonterms = g.n_symbols - g.n_terminals;
    let mut action = vec![vec![Action::Err; n_cols]; n_states];
    let mut goto_ = vec![vec![None; n_nonterms]; n_states];
    let mut sr_conflicts = 0usize;
    let mut rr_conflicts = 0usize;

    for (state, kernel) in kernels.iter().enumerate() {
        // shifts and gotos from the LR(0) transitions
        for ((s, sym), target) in transitions.iter() {
            if *s != state as u32 {
                continue;
            }
            if (*sym as usize) < g.n_terminals {
                action[state][*sym as usize] = Action::Shift(*target);
            } else {
                goto_[state][*sym as usize - g.n_terminals] = Some(*target);
            }
        }
        // reductions from the LR(1) closure over the kernel lookaheads
        let seed: Vec<(Item, u32)> = kernel
            .iter()
            .enumerate()
            .flat_map(|(ki, &item)| {
                let la = lookaheads[state][ki];
                (0..n_cols as u32)
                    .filter(move |t| la & (1 << t) != 0)
                    .map(move |t| (item, t))
            })
            .collect();
        let closed = lr1_closure(g, &first, &seed);
        for &(item, la) in &closed {
            let prod = &g.productions[item.prod as usize];
            if (item.dot as usize) < prod.rhs.len() || la as usize == hash_mark {
                continue;
            }
            if item.prod == 0 {
                continue; // the augmented production never reduces
            }
            let t = la as usize;
            match action[state][t] {
                Action::Err => action[state][t] = Action::Reduce(item.prod),
                Action::Shift(_) => {
                    let tok_prec = g.prec.get(t).copied().flatten();
                    let resolved = resolve_shift_reduce(tok_prec, prod.prec);
                    match resolved {
                        Resolution::Shift => {}
                        Resolution::Reduce => action[state][t] = Action::Reduce(item.prod),
                        Resolution::Error => action[state][t] = Action::Err,
                        Resolution::DefaultShift => sr_conflicts += 1,
                    }
                }
                Action::Reduce(other) if other != item.prod => {
                    rr_conflicts += 1;
                    if item.prod < other {
                        action[state][t] = Action::Reduce(item.prod);
                    }
                }
                Action::Reduce(_) => {}
            }
        }
    }

    if sr_conflicts + rr_conflicts > 0 {
        log::debug!(
            "grammar: {} shift/reduce and {} reduce/reduce conflicts resolved by default",
            sr_conflicts,
            rr_conflicts
        );
    }

    // default reductions: a state whose only possible move is one
    // particular reduction performs it without lookahead
    let default_reduce = action
        .iter()
        .map(|row| {
            let mut reduce: Option<u32> = None;
            for entry in row {
                match entry {
                    Action::Shift(_) => return None,
                    Action::Reduce(p) => match reduce {
                        None => reduce = Some(*p),
                        Some(q) if q != *p => return None,
                        Some(_) => {}
                    },
                    Action::Err => {}
                }
            }
            reduce
        })
        .collect();

    ParseTables {
        action,
        goto_,
        default_reduce,
    }
}

enum Resolution {
    Shift,
    Reduce,
    Error,
    /// No precedence information: yacc's default of shifting.
    DefaultShift,
}

fn resolve_shift_reduce(token: Option<PrecEntry>, production: Option<PrecEntry>) -> Resolution {
    match (token, production) {
        (Some(t), Some(p)) => {
            if p.level > t.level {
                Resolution::Reduce
            } else if t.level > p.level {
                Resolution::Shift
            } else {
                match t.assoc {
                    Assoc::Left => Resolution::Reduce,
                    Assoc::Right => Resolution::Shift,
                    Assoc::NonAssoc => Resolution::Error,
                }
            }
        }
        _ => Resolution::DefaultShift,
    }
}

/// Nullability and FIRST sets over all grammar symbols.
struct FirstSets {
    first: Vec<Lookahead>,
    nullable: Vec<bool>,
}

impl FirstSets {
    fn compute(g: &GrammarDef) -> Self {
        let mut first = vec![0 as Lookahead; g.n_symbols + 1];
        let mut nullable = vec![false; g.n_symbols + 1];
        for t in 0..g.n_terminals {
            first[t] = 1 << t;
        }
        let mut changed = true;
        while changed {
            changed = false;
            for p in &g.productions {
                let lhs = p.lhs as usize;
                let mut acc: Lookahead = 0;
                let mut all_nullable = true;
                for &sym in &p.rhs {
                    acc |= first[sym as usize];
                    if !nullable[sym as usize] {
                        all_nullable = false;
                        break;
                    }
                }
                if first[lhs] | acc != first[lhs] {
                    first[lhs] |= acc;
                    changed = true;
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }
        Self { first, nullable }
    }

    /// FIRST of the string `syms` followed by the lookahead `la`; `la`
    /// may be the synthetic `#` marker, represented past the symbols.
    fn first_of_string(&self, g: &GrammarDef, syms: &[Sym], la: u32) -> Vec<u32> {
        let mut out: Lookahead = 0;
        let mut tail_nullable = true;
        for &sym in syms {
            out |= self.first[sym as usize];
            if !self.nullable[sym as usize] {
                tail_nullable = false;
                break;
            }
        }
        let mut result: Vec<u32> = (0..=g.eof_mark as u32)
            .filter(|t| out & (1 << t) != 0)
            .collect();
        if tail_nullable {
            result.push(la);
        }
        result
    }
}

fn lr0_closure(g: &GrammarDef, kernel: &[Item]) -> Vec<Item> {
    let mut items: Vec<Item> = kernel.to_vec();
    let mut seen: FxHashMap<Item, ()> = items.iter().map(|&i| (i, ())).collect();
    let mut work = 0;
    while work < items.len() {
        let item = items[work];
        work += 1;
        let rhs = &g.productions[item.prod as usize].rhs;
        if (item.dot as usize) >= rhs.len() {
            continue;
        }
        let sym = rhs[item.dot as usize];
        if (sym as usize) < g.n_terminals {
            continue;
        }
        for (pi, p) in g.productions.iter().enumerate() {
            if p.lhs == sym {
                let new = Item {
                    prod: pi as u32,
                    dot: 0,
                };
                if seen.insert(new, ()).is_none() {
                    items.push(new);
                }
            }
        }
    }
    items
}

/// LR(1) closure over (item, lookahead) pairs; lookaheads are terminal
/// indices, `eof_mark`, or the synthetic `#` (`n_symbols`).
fn lr1_closure(g: &GrammarDef, first: &FirstSets, seed: &[(Item, u32)]) -> Vec<(Item, u32)> {
    let mut items: Vec<(Item, u32)> = seed.to_vec();
    let mut seen: FxHashMap<(Item, u32), ()> = items.iter().map(|&i| (i, ())).collect();
    let mut work = 0;
    while work < items.len() {
        let (item, la) = items[work];
        work += 1;
        let rhs = &g.productions[item.prod as usize].rhs;
        if (item.dot as usize) >= rhs.len() {
            continue;
        }
        let sym = rhs[item.dot as usize];
        if (sym as usize) < g.n_terminals {
            continue;
        }
        let beta = &rhs[item.dot as usize + 1..];
        let follow = first.first_of_string(g, beta, la);
        for (pi, p) in g.productions.iter().enumerate() {
            if p.lhs != sym {
                continue;
            }
            for &b in &follow {
                let new = (
                    Item {
                        prod: pi as u32,
                        dot: 0,
                    },
                    b,
                );
                if seen.insert(new, ()).is_none() {
                    items.push(new);
                }
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny expression grammar:
    /// S' -> E; E -> E + T | T; T -> T * F | F; F -> ( E ) | id
    fn toy_grammar() -> GrammarDef {
        // terminals: 0 '+', 1 '*', 2 '(', 3 ')', 4 id; eof_mark 5
        let t_plus = 0;
        let t_star = 1;
        let t_lp = 2;
        let t_rp = 3;
        let t_id = 4;
        let eof = 5;
        let nt_e: Sym = 6;
        let nt_t: Sym = 7;
        let nt_f: Sym = 8;
        let nt_s: Sym = 9;
        let prods = vec![
            Production {
                lhs: nt_s,
                rhs: vec![nt_e],
                prec: None,
            },
            Production {
                lhs: nt_e,
                rhs: vec![nt_e, t_plus, nt_t],
                prec: None,
            },
            Production {
                lhs: nt_e,
                rhs: vec![nt_t],
                prec: None,
            },
            Production {
                lhs: nt_t,
                rhs: vec![nt_t, t_star, nt_f],
                prec: None,
            },
            Production {
                lhs: nt_t,
                rhs: vec![nt_f],
                prec: None,
            },
            Production {
                lhs: nt_f,
                rhs: vec![t_lp, nt_e, t_rp],
                prec: None,
            },
            Production {
                lhs: nt_f,
                rhs: vec![t_id],
                prec: None,
            },
        ];
        GrammarDef {
            n_terminals: 5,
            eof_mark: eof,
            n_symbols: 10,
            productions: prods,
            prec: vec![None; 6],
        }
    }

    /// Drive the toy tables over a token string, returning success.
    fn accepts(tables: &ParseTables, g: &GrammarDef, tokens: &[usize]) -> bool {
        // the accepting configuration: E on top of state 0 with eof next
        let accept_state = tables.goto_[0][6 - g.n_terminals].expect("goto(0, E)");
        let mut stack: Vec<u32> = vec![0];
        let mut input: Vec<usize> = tokens.to_vec();
        input.push(g.eof_mark);
        let mut ip = 0;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > 10_000 {
                return false;
            }
            let state = *stack.last().unwrap() as usize;
            let tok = input[ip];
            match tables.action[state][tok] {
                Action::Shift(s) => {
                    stack.push(s);
                    ip += 1;
                }
                Action::Reduce(p) => {
                    let prod = &g.productions[p as usize];
                    for _ in 0..prod.rhs.len() {
                        stack.pop();
                    }
                    let state = *stack.last().unwrap() as usize;
                    match tables.goto_[state][prod.lhs as usize - g.n_terminals] {
                        Some(s) => stack.push(s),
                        None => return false,
                    }
                }
                Action::Err => {
                    return tok == g.eof_mark && state as u32 == accept_state && stack.len() == 2;
                }
            }
        }
    }

    #[test]
    fn test_toy_grammar_accepts_expressions() {
        let g = toy_grammar();
        let tables = build_tables(&g);
        // id + id * id
        assert!(accepts(&tables, &g, &[4, 0, 4, 1, 4]));
        // ( id + id ) * id
        assert!(accepts(&tables, &g, &[2, 4, 0, 4, 3, 1, 4]));
        // id id is not a sentence
        assert!(!accepts(&tables, &g, &[4, 4]));
        // unbalanced parens
        assert!(!accepts(&tables, &g, &[2, 4, 0, 4]));
    }

    #[test]
    fn test_precedence_resolution() {
        let left = PrecEntry {
            level: 3,
            assoc: Assoc::Left,
        };
        let tighter = PrecEntry {
            level: 5,
            assoc: Assoc::Left,
        };
        assert!(matches!(
            resolve_shift_reduce(Some(left), Some(tighter)),
            Resolution::Reduce
        ));
        assert!(matches!(
            resolve_shift_reduce(Some(tighter), Some(left)),
            Resolution::Shift
        ));
        assert!(matches!(
            resolve_shift_reduce(Some(left), Some(left)),
            Resolution::Reduce
        ));
        let nonassoc = PrecEntry {
            level: 3,
            assoc: Assoc::NonAssoc,
        };
        assert!(matches!(
            resolve_shift_reduce(Some(nonassoc), Some(nonassoc)),
            Resolution::Error
        ));
        assert!(matches!(
            resolve_shift_reduce(None, Some(left)),
            Resolution::DefaultShift
        ));
    }
}
