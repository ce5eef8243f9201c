//! `$dotted.name` substitution against a variable table.

/// Marks the start of a variable reference.
pub const VARIABLE_MARK: char = '$';

/// Replace every `$key` in `text` with its value.
///
/// Keys are applied longest first (ties broken in reverse lexical order)
/// so `$a.b` is never consumed by a shorter key `a`. Tokens with no
/// matching key are left untouched, which keeps shell variables such as
/// `$HOME` intact.
pub fn evaluate_against_dynamic_fields<'a, I>(text: &str, fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    if !text.contains(VARIABLE_MARK) {
        return text.to_string();
    }

    let mut ordered: Vec<(&String, &String)> = fields.into_iter().collect();
    ordered.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));

    let mut evaluated = text.to_string();
    for (key, value) in ordered {
        let token = format!("{VARIABLE_MARK}{key}");
        if evaluated.contains(&token) {
            evaluated = evaluated.replace(&token, value);
        }
    }
    evaluated
}
