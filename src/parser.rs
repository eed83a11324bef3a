use crate::ast::{Assertion, Ast, LookKind, RepeatKind};
use crate::bitset::ClassSet;
use crate::error::Error;
use crate::lexer::{ClassAtom, Lexer, QuantKind, Shorthand, Token, TokenKind};

/// The maximum capture group index; backreferences only reach `\1`..`\9`.
pub const MAX_CAPTURE_GROUPS: u8 = 9;

/// A recursive-descent parser over the lexer's token stream.
///
/// Grammar, lowest precedence first:
///
/// ```text
/// pattern     ::= alternation
/// alternation ::= sequence ('|' sequence)*
/// sequence    ::= term*
/// term        ::= atom quantifier?
/// atom        ::= char | escaped | '.' | group | class | anchor | backref
/// ```
pub struct Parser<'p> {
    lexer: Lexer<'p>,
    /// Capture counter, bumped at each capturing `(` in source order.
    groups: u8,
    /// Forward references waiting for their group to open. A reference is
    /// satisfiable only by a group on its own execution path, so entries
    /// are shelved while sibling alternatives parse; whatever is still
    /// here at the end of the pattern was never satisfied.
    pending_refs: Vec<u8>,
}

/// Parse a pattern into its syntax tree, returning the tree and the number
/// of capturing groups.
pub fn parse(pattern: &str) -> Result<(Ast, u8), Error> {
    let mut parser = Parser { lexer: Lexer::new(pattern), groups: 0, pending_refs: vec![] };
    let ast = parser.parse_alternation()?;
    if let Some(tok) = parser.lexer.next()? {
        // The only way to stop early is a `)` with no open group.
        return Err(Error::syntax(tok.pos, "unmatched `)`"));
    }
    if let Some(&k) = parser.pending_refs.first() {
        return Err(Error::InvalidBackref(k as u32));
    }
    Ok((ast, parser.groups))
}

impl<'p> Parser<'p> {
    fn parse_alternation(&mut self) -> Result<Ast, Error> {
        let outer_refs = self.pending_refs.len();
        let first = self.parse_sequence()?;
        match self.lexer.peek()? {
            Some(tok) if tok.kind == TokenKind::Pipe => {
                self.lexer.next()?;
                // Forward references born in this alternative cannot be
                // satisfied by groups in its siblings; shelve them until
                // the whole alternation is behind us, where the common
                // continuation can still satisfy them.
                let carried = self.pending_refs.split_off(outer_refs);
                // Right-leaning tree; emission order keeps the leftmost
                // alternative at the highest thread priority.
                let rest = self.parse_alternation()?;
                self.pending_refs.extend(carried);
                Ok(Ast::Alternate(Box::new(first), Box::new(rest)))
            }
            _ => Ok(first),
        }
    }

    fn parse_sequence(&mut self) -> Result<Ast, Error> {
        let mut terms = vec![];
        loop {
            match self.lexer.peek()? {
                None => break,
                Some(tok) => match tok.kind {
                    TokenKind::Pipe | TokenKind::GroupClose => break,
                    _ => {}
                },
            }
            let term = self.parse_term()?;
            terms.push(term);
        }
        Ok(match terms.len() {
            0 => Ast::Empty,
            1 => terms.pop().unwrap(),
            _ => Ast::Concat(terms),
        })
    }

    fn parse_term(&mut self) -> Result<Ast, Error> {
        let atom = self.parse_atom()?;
        match self.lexer.peek()? {
            Some(&Token { kind: TokenKind::Quantifier { min, max, kind }, pos }) => {
                self.lexer.next()?;
                if let Some(max) = max {
                    if min > max {
                        return Err(Error::syntax(pos, "repetition bounds are reversed"));
                    }
                }
                let kind = match kind {
                    QuantKind::Greedy => RepeatKind::Greedy,
                    QuantKind::Lazy => RepeatKind::Lazy,
                    QuantKind::Possessive => RepeatKind::Possessive,
                };
                Ok(Ast::Repeat { ast: Box::new(atom), min, max, kind })
            }
            _ => Ok(atom),
        }
    }

    fn parse_atom(&mut self) -> Result<Ast, Error> {
        let tok = self.lexer.next()?.expect("caller checked for a pending token");
        match tok.kind {
            TokenKind::Literal(c) => Ok(Ast::Char(c)),
            TokenKind::Dot => Ok(Ast::Dot),
            TokenKind::Caret => Ok(Ast::Assertion(Assertion::StartAnchor)),
            TokenKind::Dollar => Ok(Ast::Assertion(Assertion::EndAnchor)),
            TokenKind::WordBoundary => Ok(Ast::Assertion(Assertion::WordBoundary)),
            TokenKind::NotWordBoundary => Ok(Ast::Assertion(Assertion::NotWordBoundary)),
            TokenKind::Class(s) => Ok(shorthand_class(s)),
            TokenKind::Backref(k) => {
                if k > self.groups {
                    self.pending_refs.push(k);
                }
                Ok(Ast::Backref(k))
            }
            TokenKind::ClassOpen => self.parse_class(tok.pos),
            TokenKind::GroupOpen => {
                if self.groups >= MAX_CAPTURE_GROUPS {
                    return Err(Error::syntax(tok.pos, "more than 9 capturing groups"));
                }
                self.groups += 1;
                let index = self.groups;
                self.pending_refs.retain(|&k| k != index);
                let inner = self.parse_alternation()?;
                self.expect_close(tok.pos)?;
                Ok(Ast::Group { ast: Box::new(inner), index })
            }
            TokenKind::GroupOpenNonCapturing => {
                let inner = self.parse_alternation()?;
                self.expect_close(tok.pos)?;
                Ok(inner)
            }
            TokenKind::GroupOpenLookahead => self.parse_look(tok.pos, LookKind::Ahead),
            TokenKind::GroupOpenNegLookahead => self.parse_look(tok.pos, LookKind::NegativeAhead),
            TokenKind::GroupOpenLookbehind => self.parse_look(tok.pos, LookKind::Behind),
            TokenKind::GroupOpenNegLookbehind => {
                self.parse_look(tok.pos, LookKind::NegativeBehind)
            }
            TokenKind::Quantifier { .. } => {
                Err(Error::syntax(tok.pos, "quantifier with nothing to repeat"))
            }
            TokenKind::Pipe | TokenKind::GroupClose => {
                unreachable!("sequence loop stops before `|` and `)`")
            }
        }
    }

    fn parse_look(&mut self, pos: usize, kind: LookKind) -> Result<Ast, Error> {
        let inner = self.parse_alternation()?;
        self.expect_close(pos)?;
        Ok(Ast::Look { ast: Box::new(inner), kind })
    }

    fn expect_close(&mut self, open_pos: usize) -> Result<(), Error> {
        match self.lexer.next()? {
            Some(Token { kind: TokenKind::GroupClose, .. }) => Ok(()),
            _ => Err(Error::syntax(open_pos, "unmatched `(`")),
        }
    }

    /// Parse a `[...]` body. The leading `[` is already consumed.
    fn parse_class(&mut self, open_pos: usize) -> Result<Ast, Error> {
        let negated = self.lexer.eat('^');
        let mut set = ClassSet::new();
        let mut items = 0usize;
        loop {
            let atom = match self.lexer.next_class_atom()? {
                Some(atom) => atom,
                None => return Err(Error::syntax(open_pos, "unmatched `[`")),
            };
            match atom {
                ClassAtom::End => break,
                ClassAtom::Shorthand(s) => {
                    // Complemented shorthands inside a class contribute
                    // their complement within the Latin-1 table.
                    let (base, inverted) = shorthand_table(s);
                    if inverted {
                        for b in 0u16..256 {
                            if !base.contains(b as u8) {
                                set.insert(b as u8);
                            }
                        }
                    } else {
                        set.union(&base);
                    }
                    items += 1;
                }
                ClassAtom::Char(lo) => {
                    let lo = self.class_byte(open_pos, lo)?;
                    // `a-z` is a range unless the `-` is last, as in `[a-]`.
                    if self.lexer.peek_raw() == Some('-') {
                        self.lexer.eat('-');
                        match self.lexer.next_class_atom()? {
                            None => return Err(Error::syntax(open_pos, "unmatched `[`")),
                            Some(ClassAtom::End) => {
                                set.insert(lo);
                                set.insert(b'-');
                                items += 2;
                                break;
                            }
                            Some(ClassAtom::Shorthand(_)) => {
                                return Err(Error::syntax(
                                    open_pos,
                                    "shorthand class may not bound a range",
                                ))
                            }
                            Some(ClassAtom::Char(hi)) => {
                                let hi = self.class_byte(open_pos, hi)?;
                                if lo > hi {
                                    return Err(Error::syntax(
                                        open_pos,
                                        "character range is reversed",
                                    ));
                                }
                                set.insert_range(lo, hi);
                                items += 1;
                            }
                        }
                    } else {
                        set.insert(lo);
                        items += 1;
                    }
                }
            }
        }
        if items == 0 {
            return Err(Error::syntax(open_pos, "empty character class"));
        }
        Ok(Ast::Class { set, negated })
    }

    fn class_byte(&self, open_pos: usize, c: char) -> Result<u8, Error> {
        u8::try_from(c as u32).map_err(|_| {
            Error::syntax(open_pos, "character class members must be in the Latin-1 range")
        })
    }
}

fn shorthand_table(s: Shorthand) -> (ClassSet, bool) {
    match s {
        Shorthand::Digit => (Ast::digit_set(), false),
        Shorthand::NotDigit => (Ast::digit_set(), true),
        Shorthand::Word => (Ast::word_set(), false),
        Shorthand::NotWord => (Ast::word_set(), true),
        Shorthand::Space => (Ast::space_set(), false),
        Shorthand::NotSpace => (Ast::space_set(), true),
    }
}

/// Expand a top-level shorthand into its bit-table class; complements set
/// the inverted flag so the table stays small and the generator stays
/// uniform.
fn shorthand_class(s: Shorthand) -> Ast {
    let (set, negated) = shorthand_table(s);
    Ast::Class { set, negated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(pattern: &str) -> Ast {
        parse(pattern).unwrap().0
    }

    #[test]
    fn literals_concat() {
        assert_eq!(p("ab"), Ast::Concat(vec![Ast::Char('a'), Ast::Char('b')]));
        assert_eq!(p("a"), Ast::Char('a'));
        assert_eq!(p(""), Ast::Empty);
    }

    #[test]
    fn alternation_is_right_leaning() {
        assert_eq!(
            p("a|b|c"),
            Ast::Alternate(
                Box::new(Ast::Char('a')),
                Box::new(Ast::Alternate(Box::new(Ast::Char('b')), Box::new(Ast::Char('c')))),
            )
        );
    }

    #[test]
    fn empty_alternative() {
        assert_eq!(
            p("a|"),
            Ast::Alternate(Box::new(Ast::Char('a')), Box::new(Ast::Empty))
        );
    }

    #[test]
    fn quantifiers() {
        assert_eq!(
            p("a*?"),
            Ast::Repeat {
                ast: Box::new(Ast::Char('a')),
                min: 0,
                max: None,
                kind: RepeatKind::Lazy,
            }
        );
        assert_eq!(
            p("a{2,5}+"),
            Ast::Repeat {
                ast: Box::new(Ast::Char('a')),
                min: 2,
                max: Some(5),
                kind: RepeatKind::Possessive,
            }
        );
    }

    #[test]
    fn capture_numbering_is_source_order() {
        let (ast, groups) = parse("((a)(?:b))(?=x)(c)").unwrap();
        assert_eq!(groups, 3);
        // Group 1 wraps the whole head, group 2 the inner `a`, group 3 `c`;
        // the non-capturing group and the lookahead take no index.
        let expected = Ast::Concat(vec![
            Ast::Group {
                index: 1,
                ast: Box::new(Ast::Concat(vec![
                    Ast::Group { index: 2, ast: Box::new(Ast::Char('a')) },
                    Ast::Char('b'),
                ])),
            },
            Ast::Look { kind: LookKind::Ahead, ast: Box::new(Ast::Char('x')) },
            Ast::Group { index: 3, ast: Box::new(Ast::Char('c')) },
        ]);
        assert_eq!(ast, expected);
    }

    #[test]
    fn forward_backref_is_legal_when_satisfied() {
        assert!(parse(r"(\2(a))").is_ok());
        assert_eq!(parse(r"\3(a)"), Err(Error::InvalidBackref(3)));
    }

    #[test]
    fn forward_backref_scope_is_the_containing_alternative() {
        // Group 1 lives in a sibling alternative; the branch holding `\1`
        // can never satisfy it.
        assert_eq!(parse(r"\1|(a)"), Err(Error::InvalidBackref(1)));
        // Backward reference across alternatives is fine: group 1 is
        // already numbered when `\1` is read.
        assert!(parse(r"(a)|\1").is_ok());
        // A group opening later on the same path satisfies a forward
        // reference, even from inside a following alternation.
        assert!(parse(r"\2(a|(b))").is_ok());
        // A sibling of the referencing alternative does not.
        assert_eq!(parse(r"((\3|y)|(b))"), Err(Error::InvalidBackref(3)));
    }

    #[test]
    fn quantifiers_apply_to_assertions() {
        assert_eq!(
            p("^*"),
            Ast::Repeat {
                ast: Box::new(Ast::Assertion(Assertion::StartAnchor)),
                min: 0,
                max: None,
                kind: RepeatKind::Greedy,
            }
        );
        assert!(matches!(
            p(r"\b+"),
            Ast::Repeat { min: 1, max: None, .. }
        ));
        assert!(matches!(
            p("(?=a){2}"),
            Ast::Repeat { min: 2, max: Some(2), .. }
        ));
    }

    #[test]
    fn classes() {
        let set = match p("[a-cx]") {
            Ast::Class { set, negated: false } => set,
            other => panic!("unexpected ast: {:?}", other),
        };
        assert!(set.contains(b'a') && set.contains(b'c') && set.contains(b'x'));
        assert!(!set.contains(b'd'));

        assert!(matches!(p("[^0-9]"), Ast::Class { negated: true, .. }));
        // A trailing dash is a literal member.
        let set = match p("[a-]") {
            Ast::Class { set, .. } => set,
            other => panic!("unexpected ast: {:?}", other),
        };
        assert!(set.contains(b'-') && set.contains(b'a'));
    }

    #[test]
    fn class_shorthand_members() {
        let set = match p(r"[\d_]") {
            Ast::Class { set, negated: false } => set,
            other => panic!("unexpected ast: {:?}", other),
        };
        assert!(set.contains(b'0') && set.contains(b'9') && set.contains(b'_'));
        assert!(!set.contains(b'a'));
    }

    #[test]
    fn failure_kinds() {
        assert!(matches!(parse("(a"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("[a"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("[z-a]"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("[]"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("*a"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("a{5,2}"), Err(Error::Syntax { .. })));
        assert!(matches!(parse(")"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("(((((((((("), Err(Error::Syntax { .. })));
    }

    #[test]
    fn too_many_groups() {
        let pattern = "(a)".repeat(10);
        assert!(matches!(parse(&pattern), Err(Error::Syntax { .. })));
        assert!(parse(&"(a)".repeat(9)).is_ok());
    }
}
