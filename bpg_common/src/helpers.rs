/// Strips an authentication scheme word (e.g. `Apikey`, `Bearer`) from the front of a header value.
///
/// The scheme is matched case-insensitively and must be followed by at least one space. Surrounding whitespace is
/// trimmed from the returned credential. Returns `None` if the value does not start with the scheme, or if nothing
/// follows it.
pub fn strip_auth_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let value = value.trim();
    let (head, rest) = value.split_once(char::is_whitespace)?;
    if !head.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let credential = rest.trim();
    (!credential.is_empty()).then_some(credential)
}
