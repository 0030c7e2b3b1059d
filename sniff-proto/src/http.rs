/// Plaintext HTTP fallback: find the `Host` header in the first bytes of a
/// request. Best effort only, nothing here fails.

const LINE_END: &[u8] = b"\r\n";
/// Matched case-sensitively, with exactly one space after the colon.
const HOST_PREFIX: &[u8] = b"Host: ";

/// Return the value of the first line starting with `Host: `, without scheme.
pub fn scan_http_host(buf: &[u8]) -> Option<String> {
    CrlfLines::new(buf)
        .find_map(|line| line.strip_prefix(HOST_PREFIX))
        .map(|host| String::from_utf8_lossy(host).into_owned())
}

/// Split on CR LF. The trailing segment after the last terminator is yielded
/// as a line too.
struct CrlfLines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> CrlfLines<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { rest: Some(buf) }
    }
}

impl<'a> Iterator for CrlfLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest?;
        match rest.windows(LINE_END.len()).position(|w| w == LINE_END) {
            Some(i) => {
                self.rest = Some(&rest[i + LINE_END.len()..]);
                Some(&rest[..i])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}
