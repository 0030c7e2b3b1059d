/// ClientHello decoder: locate the SNI extension in the first bytes of a
/// TCP connection. No TLS library needed.
///
/// TLS record format:
///   ContentType(1) | Version(2) | Length(2) | Fragment...
///
/// Handshake:
///   HandshakeType(1) | Length(3) | ClientHello...
///
/// ClientHello:
///   Version(2) | Random(32) | SessionID(var) | CipherSuites(var) |
///   CompressionMethods(var) | Extensions(var)
///
/// SNI extension (type 0x0000):
///   ServerNameList length(2) | NameType(1) | HostName length(2) | HostName...
///
/// The record and handshake headers are never inspected. Everything before
/// the session id is assumed to have the classic fixed layout, so DTLS and
/// records fragmented across reads are not supported.
use thiserror::Error;

// ── Constants ────────────────────────────────────────────────────────

/// Record header (5) + handshake header (4) + legacy version (2) + random (32).
/// Valid only for a single unfragmented ClientHello record.
pub const SESSION_ID_LEN_OFFSET: usize = 43;

/// ServerNameList length (2) + NameType (1) + HostName length (2).
/// Assumes exactly one ServerName entry: the hostname is the rest of the
/// extension payload, the inner HostName length is not consulted.
pub const SNI_NAME_SKIP: usize = 5;

/// Extension type of server_name (RFC 6066, section 3).
pub const EXT_SERVER_NAME: u16 = 0x0000;

// ── Errors ───────────────────────────────────────────────────────────

/// Which field of the ClientHello could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeReason {
    #[error("session id length missing")]
    SessionIdLength,
    #[error("session id truncated")]
    SessionId,
    #[error("cipher suites length missing")]
    CipherSuitesLength,
    #[error("cipher suites truncated")]
    CipherSuites,
    #[error("compression methods length missing")]
    CompressionMethodsLength,
    #[error("compression methods truncated")]
    CompressionMethods,
    #[error("extensions length truncated")]
    ExtensionsLength,
    #[error("extensions block exceeds buffer")]
    Extensions,
    #[error("extension header crosses end of extensions block")]
    ExtensionHeader,
    #[error("extension payload crosses end of extensions block")]
    ExtensionPayload,
    #[error("server name extension shorter than its fixed header")]
    ServerNameEntry,
    #[error("server name is not valid UTF-8")]
    ServerNameEncoding,
}

/// A buffer that starts like a TLS handshake record but whose ClientHello
/// fields do not fit in it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} at offset {offset}")]
pub struct DecodeError {
    pub reason: DecodeReason,
    /// Byte offset into the buffer where the missing or bad field starts.
    pub offset: usize,
}

impl DecodeError {
    fn new(reason: DecodeReason, offset: usize) -> Self {
        Self { reason, offset }
    }
}

// ── Bounds-checked reader ────────────────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn u8(&mut self, reason: DecodeReason) -> Result<u8, DecodeError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(DecodeError::new(reason, self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self, reason: DecodeReason) -> Result<u16, DecodeError> {
        match self.buf.get(self.pos..self.pos + 2) {
            Some(b) => {
                self.pos += 2;
                Ok(u16::from_be_bytes([b[0], b[1]]))
            }
            None => Err(DecodeError::new(reason, self.pos)),
        }
    }

    /// Claim the next `len` bytes without copying them.
    fn span(&mut self, len: usize, reason: DecodeReason) -> Result<Span, DecodeError> {
        let span = Span {
            offset: self.pos,
            len,
        };
        if span.end() > self.buf.len() {
            return Err(DecodeError::new(reason, self.pos));
        }
        self.pos = span.end();
        Ok(span)
    }
}

// ── ClientHello view ─────────────────────────────────────────────────

/// An `(offset, len)` pair into the buffer a view was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Offsets of the variable-length ClientHello fields, all validated against
/// the buffer they borrow.
#[derive(Debug, Clone, Copy)]
pub struct ClientHelloView<'a> {
    buf: &'a [u8],
    pub session_id: Span,
    pub cipher_suites: Span,
    pub compression_methods: Span,
    pub extensions: Span,
}

impl<'a> ClientHelloView<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::at(buf, SESSION_ID_LEN_OFFSET);

        let session_id_len = r.u8(DecodeReason::SessionIdLength)? as usize;
        let session_id = r.span(session_id_len, DecodeReason::SessionId)?;

        let cipher_suites_len = r.u16(DecodeReason::CipherSuitesLength)? as usize;
        let cipher_suites = r.span(cipher_suites_len, DecodeReason::CipherSuites)?;

        let compression_len = r.u8(DecodeReason::CompressionMethodsLength)? as usize;
        let compression_methods = r.span(compression_len, DecodeReason::CompressionMethods)?;

        // A ClientHello may end right after the compression methods.
        let extensions = if r.is_exhausted() {
            Span {
                offset: r.pos,
                len: 0,
            }
        } else {
            let len = r.u16(DecodeReason::ExtensionsLength)? as usize;
            r.span(len, DecodeReason::Extensions)?
        };

        Ok(Self {
            buf,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    pub fn bytes(&self, span: Span) -> &'a [u8] {
        &self.buf[span.offset..span.end()]
    }

    pub fn extensions(&self) -> Extensions<'a> {
        Extensions {
            buf: self.buf,
            block: self.extensions,
            pos: self.extensions.offset,
            done: false,
        }
    }
}

// ── Extensions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    pub kind: u16,
    /// Offset of `data` in the original buffer.
    pub offset: usize,
    pub data: &'a [u8],
}

/// Iterator over `type(2) | length(2) | payload` entries of the extensions
/// block. Yields one error and then stops if an entry crosses the block end.
pub struct Extensions<'a> {
    buf: &'a [u8],
    block: Span,
    pos: usize,
    done: bool,
}

impl<'a> Extensions<'a> {
    fn read_entry(&self) -> Result<(Extension<'a>, usize), DecodeError> {
        let mut r = Reader::at(&self.buf[..self.block.end()], self.pos);
        let kind = r.u16(DecodeReason::ExtensionHeader)?;
        let len = r.u16(DecodeReason::ExtensionHeader)? as usize;
        let payload = r.span(len, DecodeReason::ExtensionPayload)?;
        let ext = Extension {
            kind,
            offset: payload.offset,
            data: &self.buf[payload.offset..payload.end()],
        };
        Ok((ext, r.pos))
    }
}

impl<'a> Iterator for Extensions<'a> {
    type Item = Result<Extension<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.block.end() {
            return None;
        }
        match self.read_entry() {
            Ok((ext, next)) => {
                self.pos = next;
                Some(Ok(ext))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ── SNI ──────────────────────────────────────────────────────────────

/// Walk a ClientHello and return the hostname of its first server_name
/// extension, without scheme. `Ok(None)` when no such extension is present.
pub fn decode_client_hello(buf: &[u8]) -> Result<Option<String>, DecodeError> {
    let hello = ClientHelloView::parse(buf)?;

    for ext in hello.extensions() {
        let ext = ext?;
        if ext.kind == EXT_SERVER_NAME {
            return server_name(&ext).map(Some);
        }
    }

    Ok(None)
}

fn server_name(ext: &Extension<'_>) -> Result<String, DecodeError> {
    let name = ext
        .data
        .get(SNI_NAME_SKIP..)
        .ok_or(DecodeError::new(DecodeReason::ServerNameEntry, ext.offset))?;

    std::str::from_utf8(name).map(str::to_owned).map_err(|e| {
        DecodeError::new(
            DecodeReason::ServerNameEncoding,
            ext.offset + SNI_NAME_SKIP + e.valid_up_to(),
        )
    })
}
