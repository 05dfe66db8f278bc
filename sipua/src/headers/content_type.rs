use std::fmt;

use crate::error::Result;
use crate::headers::SipHeaderParse;
use crate::parser::Parser;
use crate::MediaType;

/// The `Content-Type` SIP header.
///
/// Indicates the media type of the message body.
///
/// # Examples
///
/// ```
/// # use sipua::headers::ContentType;
/// # use sipua::MediaType;
/// let ctype = ContentType::new(MediaType::new("application", "sdp"));
///
/// assert_eq!("Content-Type: application/sdp", ctype.to_string());
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ContentType(pub MediaType);

impl ContentType {
    /// Creates a new `ContentType` instance.
    pub fn new(media_type: MediaType) -> Self {
        Self(media_type)
    }

    /// Returns the media type.
    pub fn media_type(&self) -> &MediaType {
        &self.0
    }
}

impl SipHeaderParse for ContentType {
    const NAME: &'static str = "Content-Type";
    const SHORT_NAME: Option<&'static str> = Some("c");
    /*
     * Content-Type     =  ( "Content-Type" / "c" ) HCOLON media-type
     * media-type       =  m-type SLASH m-subtype *(SEMI m-parameter)
     */
    fn parse(parser: &mut Parser) -> Result<Self> {
        parser.ws();
        let media_type = MediaType::parse(parser)?;

        Ok(ContentType(media_type))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", ContentType::NAME, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let src = b"application/sdp\r\n";
        let mut scanner = Parser::new(src);
        let ctype = ContentType::parse(&mut scanner).unwrap();

        assert_eq!(ctype.media_type().mimetype.mtype, "application");
        assert_eq!(ctype.media_type().mimetype.subtype, "sdp");
    }
}
