//! Arithmetic evaluator for `#if`/`#eval`/`#elif`: recursive-descent over a
//! flat, already-expanded text buffer, scanning right-to-left for the
//! lowest-precedence operator present at each level (so that splitting at
//! the rightmost occurrence yields correct left-associative grouping
//! without a separate tokenizing pass). `gpp.c: DoArithmEval`.

/// Whether `=~` glob matching is compiled in. The original treats this (and
/// the default operator-class string) as a build-time config input rather
/// than an invariant (spec.md §9); flipping it to `false` turns `=~` into a
/// fatal "glob matching not enabled" error, matching a build of the
/// original without glob support.
pub const GLOB_ENABLED: bool = true;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalResult {
    Num(i64),
    Str(String),
}

impl EvalResult {
    pub fn is_truthy_text(&self) -> bool {
        match self {
            EvalResult::Num(n) => *n != 0,
            EvalResult::Str(s) => s != "0",
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            EvalResult::Num(n) => n.to_string(),
            EvalResult::Str(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Not a real error: signals that this (sub)expression didn't parse as
    /// arithmetic, so a comparison above it should fall back to a string
    /// comparison of the raw text instead.
    #[error("not a numeric expression")]
    NotNumeric,
    #[error("division by zero")]
    DivByZero,
    #[error("modulo by zero")]
    ModByZero,
    #[error("=~ requires glob matching support")]
    GlobNotEnabled,
    #[error("malformed expression")]
    Malformed,
}

pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    /// Evaluates `expr`, returning either a numeric result or (for a
    /// comparison whose operand doesn't parse as arithmetic) a string
    /// result from the whitespace-trimmed text comparison fallback.
    pub fn eval(&self, expr: &str) -> Result<EvalResult, EvalError> {
        let buf = expr.as_bytes();
        let (s, e) = trim(buf, 0, buf.len());
        eval_or(buf, s, e)
    }

    /// Numeric-only entry point for contexts that must fail rather than
    /// fall back to string comparison (e.g. `#if`'s final truth value).
    pub fn eval_numeric(&self, expr: &str) -> Result<i64, EvalError> {
        match self.eval(expr)? {
            EvalResult::Num(n) => Ok(n),
            EvalResult::Str(_) => Err(EvalError::NotNumeric),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn trim(buf: &[u8], mut s: usize, mut e: usize) -> (usize, usize) {
    while s < e && buf[s].is_ascii_whitespace() {
        s += 1;
    }
    while s < e && buf[e - 1].is_ascii_whitespace() {
        e -= 1;
    }
    (s, e)
}

fn text(buf: &[u8], s: usize, e: usize) -> String {
    String::from_utf8_lossy(&buf[s..e]).into_owned()
}

/// Scans `[s, e)` right-to-left for the rightmost occurrence (outside
/// parentheses) of one of `ops`, tried longest-first within the list.
/// `guard_leading` skips a match that starts exactly at `s` (used for
/// binary `+`/`-`, which must not be confused with a unary sign).
fn find_rightmost(buf: &[u8], s: usize, e: usize, ops: &[&str], guard_leading: bool) -> Option<(usize, usize)> {
    let mut depth = 0i32;
    let mut p = e;
    while p > s {
        p -= 1;
        match buf[p] {
            b')' => depth += 1,
            b'(' => depth -= 1,
            _ => {}
        }
        if depth == 0 {
            for op in ops {
                let len = op.len();
                if p + len <= e && &buf[p..p + len] == op.as_bytes() {
                    if guard_leading && p == s {
                        continue;
                    }
                    return Some((p, len));
                }
            }
        }
    }
    None
}

fn eval_or(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    binary_logical(buf, s, e, &["||"], |a, b| ((a != 0) || (b != 0)) as i64, eval_and)
}

fn eval_and(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    binary_logical(buf, s, e, &["&&"], |a, b| ((a != 0) && (b != 0)) as i64, eval_bor)
}

fn eval_bor(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    binary_numeric(buf, s, e, &["|"], |a, b| Ok(a | b), eval_xor)
}

fn eval_xor(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    binary_numeric(buf, s, e, &["^"], |a, b| Ok(a ^ b), eval_band)
}

fn eval_band(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    binary_numeric(buf, s, e, &["&"], |a, b| Ok(a & b), eval_cmp_eq)
}

fn eval_cmp_eq(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    if let Some((p, len)) = find_rightmost(buf, s, e, &["!=", "==", "=~"], false) {
        let op = std::str::from_utf8(&buf[p..p + len]).unwrap();
        if op == "=~" {
            if !GLOB_ENABLED {
                return Err(EvalError::GlobNotEnabled);
            }
            let lhs = raw_text(buf, s, p);
            let rhs = raw_text(buf, p + len, e);
            let matched = glob_match(&rhs, &lhs);
            return Ok(EvalResult::Num(matched as i64));
        }
        return compare_fallback(buf, s, p, p + len, e, |a: i64, b: i64| (a == b) == (op == "=="), |a: &str, b: &str| (a == b) == (op == "=="));
    }
    eval_cmp_rel(buf, s, e)
}

fn eval_cmp_rel(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    if let Some((p, len)) = find_rightmost(buf, s, e, &[">=", "<=", ">", "<"], false) {
        let op = std::str::from_utf8(&buf[p..p + len]).unwrap();
        let (num_cmp, str_cmp): (fn(i64, i64) -> bool, fn(&str, &str) -> bool) = match op {
            ">=" => (|a, b| a >= b, |a, b| a >= b),
            "<=" => (|a, b| a <= b, |a, b| a <= b),
            ">" => (|a, b| a > b, |a, b| a > b),
            "<" => (|a, b| a < b, |a, b| a < b),
            _ => unreachable!(),
        };
        return compare_fallback(buf, s, p, p + len, e, num_cmp, str_cmp);
    }
    eval_add(buf, s, e)
}

fn compare_fallback(
    buf: &[u8],
    s: usize,
    split: usize,
    rhs_start: usize,
    e: usize,
    num_cmp: impl Fn(i64, i64) -> bool,
    str_cmp: impl Fn(&str, &str) -> bool,
) -> Result<EvalResult, EvalError> {
    let lhs = eval_or(buf, s, split);
    let rhs = eval_or(buf, rhs_start, e);
    match (lhs, rhs) {
        (Ok(EvalResult::Num(a)), Ok(EvalResult::Num(b))) => Ok(EvalResult::Num(num_cmp(a, b) as i64)),
        _ => {
            let lhs_text = raw_text(buf, s, split);
            let rhs_text = raw_text(buf, rhs_start, e);
            Ok(EvalResult::Num(str_cmp(&lhs_text, &rhs_text) as i64))
        }
    }
}

fn raw_text(buf: &[u8], s: usize, e: usize) -> String {
    let (s, e) = trim(buf, s, e);
    text(buf, s, e)
}

fn eval_add(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    if let Some((p, len)) = find_rightmost(buf, s, e, &["+", "-"], true) {
        let op = buf[p];
        let left = eval_or(buf, s, p)?;
        let right = eval_or(buf, p + len, e)?;
        let (a, b) = as_nums(left, right)?;
        return Ok(EvalResult::Num(if op == b'+' { a + b } else { a - b }));
    }
    eval_mul(buf, s, e)
}

fn eval_mul(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    if let Some((p, len)) = find_rightmost(buf, s, e, &["*", "/", "%"], false) {
        let op = buf[p];
        let left = eval_or(buf, s, p)?;
        let right = eval_or(buf, p + len, e)?;
        let (a, b) = as_nums(left, right)?;
        return Ok(EvalResult::Num(match op {
            b'*' => a.wrapping_mul(b),
            b'/' => {
                if b == 0 {
                    return Err(EvalError::DivByZero);
                }
                a / b
            }
            b'%' => {
                if b == 0 {
                    return Err(EvalError::ModByZero);
                }
                a % b
            }
            _ => unreachable!(),
        }));
    }
    eval_unary(buf, s, e)
}

fn as_nums(a: EvalResult, b: EvalResult) -> Result<(i64, i64), EvalError> {
    match (a, b) {
        (EvalResult::Num(a), EvalResult::Num(b)) => Ok((a, b)),
        _ => Err(EvalError::NotNumeric),
    }
}

fn eval_unary(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    let (s, e) = trim(buf, s, e);
    if s >= e {
        return Err(EvalError::Malformed);
    }
    match buf[s] {
        b'~' => Ok(EvalResult::Num(!expect_num(eval_unary(buf, s + 1, e)?)?)),
        b'!' => Ok(EvalResult::Num((expect_num(eval_unary(buf, s + 1, e)?)? == 0) as i64)),
        b'-' => Ok(EvalResult::Num(-expect_num(eval_unary(buf, s + 1, e)?)?)),
        _ => eval_primary(buf, s, e),
    }
}

fn expect_num(r: EvalResult) -> Result<i64, EvalError> {
    match r {
        EvalResult::Num(n) => Ok(n),
        EvalResult::Str(_) => Err(EvalError::NotNumeric),
    }
}

fn eval_primary(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    let (s, e) = trim(buf, s, e);
    if s >= e {
        return Err(EvalError::Malformed);
    }
    if buf[s] == b'(' && buf[e - 1] == b')' && parens_balanced_wrap(buf, s, e) {
        return eval_or(buf, s + 1, e - 1);
    }
    if let Some(inner) = strip_call(buf, s, e, "length") {
        let text = raw_text(buf, inner.0, inner.1);
        return Ok(EvalResult::Num(text.len() as i64));
    }
    parse_leaf(buf, s, e)
}

fn parens_balanced_wrap(buf: &[u8], s: usize, e: usize) -> bool {
    let mut depth = 0i32;
    for (i, &b) in buf[s..e].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 && i != e - s - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn strip_call(buf: &[u8], s: usize, e: usize, name: &str) -> Option<(usize, usize)> {
    let n = name.as_bytes();
    if e - s > n.len() && &buf[s..s + n.len()] == n && buf[s + n.len()] == b'(' && buf[e - 1] == b')' {
        Some((s + n.len() + 1, e - 1))
    } else {
        None
    }
}

/// Parses a decimal, `0x`-hex, or `0`-octal integer literal, matching
/// `strtol(buf, &p, 0)` semantics: the *entire* trimmed range must parse.
fn parse_leaf(buf: &[u8], s: usize, e: usize) -> Result<EvalResult, EvalError> {
    let s_text = text(buf, s, e);
    let trimmed = s_text.trim();
    let (neg, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if digits.len() > 1 && digits.starts_with('0') && digits.bytes().all(|b| b.is_ascii_digit()) {
        i64::from_str_radix(digits, 8).ok()
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse::<i64>().ok()
    } else {
        None
    };
    match parsed {
        Some(n) => Ok(EvalResult::Num(if neg { -n } else { n })),
        None => Ok(EvalResult::Str(trimmed.to_string())),
    }
}

fn binary_logical(
    buf: &[u8],
    s: usize,
    e: usize,
    ops: &[&str],
    combine: impl Fn(i64, i64) -> i64,
    next: fn(&[u8], usize, usize) -> Result<EvalResult, EvalError>,
) -> Result<EvalResult, EvalError> {
    if let Some((p, len)) = find_rightmost(buf, s, e, ops, false) {
        let left = eval_or(buf, s, p)?;
        let right = eval_or(buf, p + len, e)?;
        let (a, b) = as_nums(left, right)?;
        return Ok(EvalResult::Num(combine(a, b)));
    }
    next(buf, s, e)
}

fn binary_numeric(
    buf: &[u8],
    s: usize,
    e: usize,
    ops: &[&str],
    combine: impl Fn(i64, i64) -> Result<i64, EvalError>,
    next: fn(&[u8], usize, usize) -> Result<EvalResult, EvalError>,
) -> Result<EvalResult, EvalError> {
    if let Some((p, len)) = find_rightmost(buf, s, e, ops, false) {
        let left = eval_or(buf, s, p)?;
        let right = eval_or(buf, p + len, e)?;
        let (a, b) = as_nums(left, right)?;
        return Ok(EvalResult::Num(combine(a, b)?));
    }
    next(buf, s, e)
}

/// Minimal shell-glob matcher for `=~` (`*`, `?`, literal chars), anchored
/// on the whole string. `pattern` is the right-hand operand, `text` the
/// left-hand one, matching `gpp.c`'s glob-match argument order.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => rec(&p[1..], t) || (!t.is_empty() && rec(p, &t[1..])),
            Some(b'?') => !t.is_empty() && rec(&p[1..], &t[1..]),
            Some(&c) => t.first() == Some(&c) && rec(&p[1..], &t[1..]),
        }
    }
    rec(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(s: &str) -> EvalResult {
        Evaluator::new().eval(s).unwrap()
    }

    #[test]
    fn simple_arithmetic_precedence() {
        assert_eq!(eval("2+3*4"), EvalResult::Num(14));
        assert_eq!(eval("(2+3)*4"), EvalResult::Num(20));
    }

    #[test]
    fn left_associative_subtraction() {
        assert_eq!(eval("10-3-2"), EvalResult::Num(5));
    }

    #[test]
    fn logical_and_comparison() {
        assert_eq!(eval("2+3 > 4"), EvalResult::Num(1));
        assert_eq!(eval("1 && 0"), EvalResult::Num(0));
        assert_eq!(eval("1 || 0"), EvalResult::Num(1));
    }

    #[test]
    fn string_fallback_equality() {
        assert_eq!(eval("\"abc\" == \"abc\""), EvalResult::Num(1));
        assert_eq!(eval("abc == abc"), EvalResult::Num(1));
        assert_eq!(eval("abc == xyz"), EvalResult::Num(0));
    }

    #[test]
    fn division_by_zero_is_fatal() {
        assert_eq!(Evaluator::new().eval("1/0"), Err(EvalError::DivByZero));
    }

    #[test]
    fn length_builtin() {
        assert_eq!(eval("length(hello)"), EvalResult::Num(5));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("-5+3"), EvalResult::Num(-2));
        assert_eq!(eval("!0"), EvalResult::Num(1));
        assert_eq!(eval("~0"), EvalResult::Num(-1));
    }

    #[test]
    fn hex_and_octal_leaves() {
        assert_eq!(eval("0x10"), EvalResult::Num(16));
        assert_eq!(eval("010"), EvalResult::Num(8));
    }

    #[test]
    fn glob_match_operator() {
        assert_eq!(eval("hello =~ h*o"), EvalResult::Num(1));
        assert_eq!(eval("hello =~ x*"), EvalResult::Num(0));
    }
}
