/// Longest accepted upload filename, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Reasons an uploaded filename is rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    Empty,
    TooLong,
    /// Contains `/` or `\`.
    ContainsPathSeparator,
    /// Is exactly `..`.
    PathTraversal,
    /// Starts with a dot.
    Hidden,
    /// Contains NUL, CR, LF or another ASCII control character.
    ControlCharacter,
}

impl FilenameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::TooLong => "Filename exceeds maximum length of 255 bytes",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '..' is not allowed",
            Self::Hidden => "Invalid filename: hidden files (starting with '.') are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
        }
    }
}

/// Validate the client-supplied name of an uploaded file and return it trimmed.
///
/// Only a bare filename is accepted; the name ends up in
/// `Content-Disposition` headers on download.
pub fn validate_upload_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    if trimmed.len() > MAX_FILENAME_LEN {
        return Err(FilenameError::TooLong);
    }
    // Also covers NUL; keeps CRLF out of response headers.
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// `Content-Disposition` value that makes browsers save the file under its
/// original name.
///
/// Emits an ASCII fallback `filename` plus an RFC 5987 `filename*` carrying
/// the exact UTF-8 name.
pub fn attachment_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii = if ascii.is_empty() {
        "download".to_string()
    } else {
        ascii
    };

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
