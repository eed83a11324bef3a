use ecma_regex::{escape, CompileOptions, Error, OptLevel, Regex};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn spans(pattern: &str, text: &str) -> Vec<(usize, usize)> {
    re(pattern)
        .find_iter(text)
        .map(|m| m.map(|m| (m.start(), m.end())))
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn finds_leftmost_literal() {
    let m = re("hello").find("hello world").unwrap().unwrap();
    assert_eq!((m.start(), m.end()), (0, 5));
    assert_eq!(m.as_str("hello world"), "hello");
}

#[test]
fn test_is_anchored_both_sides() {
    assert!(!re("^exact$").test("exactly").unwrap());
    assert!(re("^exact$").test("exact").unwrap());
    // Even without pattern anchors, `test` demands the whole input.
    assert!(!re("exact").test("exactly").unwrap());
}

#[test]
fn sibling_captures() {
    let text = "abc";
    let m = re("(a)(b)(c)").find(text).unwrap().unwrap();
    assert_eq!(m.group_str(text, 1), Some("a"));
    assert_eq!(m.group_str(text, 2), Some("b"));
    assert_eq!(m.group_str(text, 3), Some("c"));
}

#[test]
fn nested_captures() {
    let text = "abc";
    let m = re("((ab)c)").find(text).unwrap().unwrap();
    assert_eq!(m.group_str(text, 1), Some("abc"));
    assert_eq!(m.group_str(text, 2), Some("ab"));
}

#[test]
fn find_all_positions() {
    assert_eq!(spans("a", "banana"), vec![(1, 2), (3, 4), (5, 6)]);
}

#[test]
fn alternation_across_sentence() {
    let text = "I have a cat and a dog, but no bird";
    let starts: Vec<usize> =
        re("cat|dog|bird").find_iter(text).map(|m| m.unwrap().start()).collect();
    assert_eq!(starts, vec![9, 19, 31]);
}

#[test]
fn lookahead_scenarios() {
    let m = re("foo(?=bar)").find("foobar").unwrap().unwrap();
    assert_eq!(m.as_str("foobar"), "foo");
    assert!(re("foo(?=bar)").find("foobaz").unwrap().is_none());
}

#[test]
fn bounded_repetition() {
    let re = re("^a{3,5}$");
    assert!(re.test("aaaa").unwrap());
    assert!(!re.test("aa").unwrap());
    assert!(!re.test("aaaaaa").unwrap());
}

#[test]
fn classes_and_shorthands() {
    assert_eq!(spans(r"\d+", "a12b345"), vec![(1, 3), (4, 7)]);
    assert_eq!(spans(r"[a-c]+", "abxcab"), vec![(0, 2), (3, 6)]);
    assert_eq!(spans(r"[^ ]+", "go on"), vec![(0, 2), (3, 5)]);
    assert!(re(r"^\S+$").test("none-of-it-is-space").unwrap());
    assert!(!re(r"^\w$").test("!").unwrap());
}

#[test]
fn dot_excludes_newline_unless_dot_all() {
    assert!(re("^a.b$").test("axb").unwrap());
    assert!(!re("^a.b$").test("a\nb").unwrap());
    let opts = CompileOptions { dot_all: true, ..CompileOptions::default() };
    let dotall = Regex::with_options("^a.b$", opts).unwrap();
    assert!(dotall.test("a\nb").unwrap());
}

#[test]
fn multiline_anchors() {
    let opts = CompileOptions { multiline: true, ..CompileOptions::default() };
    let ml = Regex::with_options("^b.*$", opts).unwrap();
    let m = ml.find("a\nbcd\ne").unwrap().unwrap();
    assert_eq!((m.start(), m.end()), (2, 5));
    // Without multiline, `^` only matches the text start.
    assert!(re("^b").find("a\nb").unwrap().is_none());
}

#[test]
fn case_insensitive_ascii_fold() {
    let opts = CompileOptions { case_insensitive: true, ..CompileOptions::default() };
    let ci = Regex::with_options("HeLLo", opts).unwrap();
    assert!(ci.test("hello").unwrap());
    assert!(ci.test("HELLO").unwrap());
    let ci_class = Regex::with_options("^[a-f]+$", opts).unwrap();
    assert!(ci_class.test("CafeBabe").unwrap());
    let ci_ref = Regex::with_options(r"^(ab)\1$", opts).unwrap();
    assert!(ci_ref.test("abAB").unwrap());
}

#[test]
fn quantifier_preferences() {
    let text = "<a><b>";
    let m = re("<.+>").find(text).unwrap().unwrap();
    assert_eq!(m.as_str(text), "<a><b>");
    let m = re("<.+?>").find(text).unwrap().unwrap();
    assert_eq!(m.as_str(text), "<a>");
    // Possessive: the quantifier swallows the closing quote and never
    // gives it back.
    assert!(re(r#""[^"]*+""#).test(r#""quoted""#).unwrap());
    assert!(re(r#"".*+""#).find(r#""quoted""#).unwrap().is_none());
}

#[test]
fn backreferences() {
    let text = "say hello hello again";
    let m = re(r"(\w+) \1").find(text).unwrap().unwrap();
    assert_eq!(m.as_str(text), "hello hello");
    assert!(re(r"^(\d+)-\1$").test("12-12").unwrap());
    assert!(!re(r"^(\d+)-\1$").test("12-13").unwrap());
}

#[test]
fn lookbehind() {
    let text = "price: 10€, 25$";
    let m = re(r"(?<=: )\d+").find(text).unwrap().unwrap();
    assert_eq!(m.as_str(text), "10");
    assert_eq!(spans(r"(?<!\d)\d", "a1 22"), vec![(1, 2), (3, 4)]);
}

#[test]
fn replace_is_literal() {
    assert_eq!(re("cat").replace("cat and cat", "dog").unwrap(), "dog and dog");
    assert_eq!(re(r"\d+").replace("a1b22c", "#").unwrap(), "a#b#c");
    // No $k expansion.
    assert_eq!(re("(a)").replace("a", "$1").unwrap(), "$1");
    // Zero-width matches replace without looping forever.
    assert_eq!(re("x*").replace("ab", "-").unwrap(), "-a-b-");
}

#[test]
fn escape_round_trip() {
    for s in ["a+b", "2^10", "[lit]", "no specials", "(((", r"back\slash"] {
        let escaped = escape(s);
        assert!(Regex::is_valid(&escaped), "escape({:?}) = {:?} must be valid", s, escaped);
        assert!(Regex::new(&escaped).unwrap().test(s).unwrap());
    }
}

#[test]
fn is_valid_matches_compile_outcome() {
    for p in ["a(b", "[z-a]", "*", "a{2", r"\8", "(?<name>x)", r"\1|(a)"] {
        assert!(!Regex::is_valid(p), "{:?} should be invalid", p);
        assert!(Regex::new(p).is_err());
    }
    for p in ["a(b)", "[a-z]", r"\*", "a{2,}", "(x)(y)(z)", "(?=a)*", r"^*\b+b"] {
        assert!(Regex::is_valid(p), "{:?} should be valid", p);
    }
}

#[test]
fn quantified_assertions_execute() {
    // Anchors and lookarounds are ordinary atoms; a quantifier on one is
    // legal, and the VM's per-cycle dedup keeps the loops finite.
    assert!(re("^*abc").test("abc").unwrap());
    assert!(re(r"^\b+cat\b+$").test("cat").unwrap());
    let m = re("foo(?=bar)*").find("foobaz").unwrap().unwrap();
    assert_eq!(m.as_str("foobaz"), "foo");
    let m = re(r"\b+\w+").find("  word").unwrap().unwrap();
    assert_eq!(m.as_str("  word"), "word");
    // A mandatory boundary repetition still has to hold once.
    assert!(re(r"\b+cat").find("concat").unwrap().is_none());
}

#[test]
fn opt_levels_agree() {
    let cases = [
        ("hello", "say hello twice"),
        ("cat|dog|bird", "no cat here"),
        ("(a+)b", "xxaaab"),
        ("^start", "start here"),
        ("a{2,30}", "caaaaab"),
    ];
    for (pattern, text) in cases {
        let mut results = vec![];
        for level in [OptLevel::None, OptLevel::Basic, OptLevel::Aggressive] {
            let opts = CompileOptions { opt_level: level, ..CompileOptions::default() };
            let re = Regex::with_options(pattern, opts).unwrap();
            let m = re.find(text).unwrap().map(|m| (m.start(), m.end()));
            results.push(m);
        }
        assert_eq!(results[0], results[1], "levels disagree on {:?}", pattern);
        assert_eq!(results[1], results[2], "levels disagree on {:?}", pattern);
    }
}

#[test]
fn find_iter_keeps_absolute_anchors() {
    // `^` refers to the real text start even after the iterator advances,
    // so an anchored pattern yields exactly one match.
    assert_eq!(spans("^a", "aaa"), vec![(0, 1)]);
    assert_eq!(spans("^", "ab"), vec![(0, 0)]);
}

#[test]
fn find_at_respects_anchors() {
    let anchored = re("^x");
    assert!(anchored.find_at("yx", 1).unwrap().is_none());
    let free = re("x");
    assert_eq!(free.find_at("yx", 1).unwrap().unwrap().start(), 1);
}

#[test]
fn step_limit_is_an_error_not_a_hang() {
    let opts = CompileOptions { max_steps: 100, ..CompileOptions::default() };
    let re = Regex::with_options(r"(a*)*$x", opts).unwrap();
    let text = "a".repeat(200);
    match re.find(&text) {
        Err(Error::StepLimit(100)) => {}
        other => panic!("expected a step-limit error, got {:?}", other),
    }
}

#[test]
fn recursion_limit_is_reported() {
    let opts = CompileOptions { max_recursion_depth: 1, ..CompileOptions::default() };
    let re = Regex::with_options("(?=a(?=b))ab", opts).unwrap();
    assert_eq!(re.find("ab"), Err(Error::RecursionLimit(1)));
}

#[test]
fn group_count_includes_whole_match() {
    assert_eq!(re("(a)(b)").group_count(), 3);
    assert_eq!(re("plain").group_count(), 1);
}

#[test]
fn nonparticipating_groups_read_as_none() {
    let text = "b";
    let m = re("(a)|b").find(text).unwrap().unwrap();
    assert_eq!(m.group(1), None);
    assert_eq!(m.group_str(text, 1), None);
}

#[test]
fn empty_pattern_and_empty_input() {
    assert!(re("").test("").unwrap());
    assert!(!re("").test("x").unwrap());
    assert_eq!(spans("", "ab"), vec![(0, 0), (1, 1), (2, 2)]);
    assert!(re("a*").test("").unwrap());
}

#[test]
fn random_digit_runs_are_fully_covered() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let digits = re(r"\d+");
    for _ in 0..50 {
        let len = rng.gen_range(0..60);
        let text: String = (0..len)
            .map(|_| if rng.gen_bool(0.3) { rng.gen_range('0'..='9') } else { 'x' })
            .collect();
        let found = digits.find_all(&text).unwrap();
        let covered: usize = found.iter().map(|m| m.end() - m.start()).sum();
        let expected = text.chars().filter(char::is_ascii_digit).count();
        assert_eq!(covered, expected, "digit runs mismatch in {:?}", text);
    }
}

#[test]
fn matches_are_ordered_and_disjoint() {
    let found = spans("a+|b+", "aabbaab");
    assert_eq!(found, vec![(0, 2), (2, 4), (4, 6), (6, 7)]);
    for w in found.windows(2) {
        assert!(w[0].1 <= w[1].0);
    }
}
