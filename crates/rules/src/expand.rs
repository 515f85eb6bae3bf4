//! `$N` placeholder expansion.

/// Replace every `$N` token in `template` with `captures[N]`.
///
/// A token is `$` followed by the longest run of ASCII digits, so `$10` is
/// index ten, never `$1` followed by `0`. Tokens whose index is out of range
/// are copied through literally, and substituted text is never re-scanned.
pub fn expand(template: &str, captures: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let token = &rest[pos..pos + 1 + digits];

        let value = (digits > 0)
            .then(|| after[..digits].parse::<usize>().ok())
            .flatten()
            .and_then(|idx| captures.get(idx));

        match value {
            Some(v) => out.push_str(v),
            None => out.push_str(token),
        }
        rest = &after[digits..];
    }

    out.push_str(rest);
    out
}
