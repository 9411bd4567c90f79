//! `$VAR` expansion for environment values, command arguments and headers.

/// Expands `$NAME` and `${NAME}` references through `lookup`.
///
/// Unknown names expand to the empty string. A `$` not followed by a name is
/// kept, and an unterminated or empty `${` is dropped.
pub fn expand_vars<'a>(value: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(dollar) = rest.find('$') {
        let (literal, tail) = rest.split_at(dollar);
        expanded.push_str(literal);
        let after = tail.get(1..).unwrap_or_default();

        if let Some(braced) = after.strip_prefix('{') {
            if let Some((name, remainder)) = braced.split_once('}')
                && !name.is_empty()
            {
                expanded.push_str(lookup(name).unwrap_or_default());
                rest = remainder;
            } else if let Some(remainder) = braced.strip_prefix('}') {
                rest = remainder;
            } else {
                rest = braced;
            }
            continue;
        }

        let name_length = after
            .find(|character: char| !(character.is_ascii_alphanumeric() || character == '_'))
            .unwrap_or(after.len());
        let (name, remainder) = after.split_at(name_length);
        if name.is_empty() {
            expanded.push('$');
        } else {
            expanded.push_str(lookup(name).unwrap_or_default());
        }
        rest = remainder;
    }
    expanded.push_str(rest);
    expanded
}

/// Looks `name` up in a list of `NAME=value` entries.
#[must_use]
pub fn lookup_entry<'a>(entries: &'a [String], name: &str) -> Option<&'a str> {
    entries.iter().find_map(|entry| {
        entry
            .strip_prefix(name)
            .and_then(|tail| tail.strip_prefix('='))
    })
}
