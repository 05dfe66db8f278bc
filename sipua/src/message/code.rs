use std::fmt;

/// An SIP status code.
///
/// Well-known codes get their own variant; anything else is kept
/// verbatim in [`StatusCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// `Trying` status code.
    Trying,
    /// `Ringing` status code.
    Ringing,
    /// `Call Is Being Forwarded` status code.
    CallIsBeingForwarded,
    /// `Queued` status code.
    Queued,
    /// `Session Progress` status code.
    SessionProgress,
    /// `OK` status code.
    Ok,
    /// `Accepted` status code.
    Accepted,
    /// `Multiple Choices` status code.
    MultipleChoices,
    /// `Moved Permanently` status code.
    MovedPermanently,
    /// `Moved Temporarily` status code.
    MovedTemporarily,
    /// `Use Proxy` status code.
    UseProxy,
    /// `Bad Request` status code.
    BadRequest,
    /// `Unauthorized` status code.
    Unauthorized,
    /// `Forbidden` status code.
    Forbidden,
    /// `Not Found` status code.
    NotFound,
    /// `Method Not Allowed` status code.
    MethodNotAllowed,
    /// `Not Acceptable` status code.
    NotAcceptable,
    /// `Proxy Authentication Required` status code.
    ProxyAuthenticationRequired,
    /// `Request Timeout` status code.
    RequestTimeout,
    /// `Gone` status code.
    Gone,
    /// `Unsupported Media Type` status code.
    UnsupportedMediaType,
    /// `Unsupported URI Scheme` status code.
    UnsupportedUriScheme,
    /// `Bad Extension` status code.
    BadExtension,
    /// `Interval Too Brief` status code.
    IntervalTooBrief,
    /// `Temporarily Unavailable` status code.
    TemporarilyUnavailable,
    /// `Call/Transaction Does Not Exist` status code.
    CallOrTransactionDoesNotExist,
    /// `Loop Detected` status code.
    LoopDetected,
    /// `Too Many Hops` status code.
    TooManyHops,
    /// `Address Incomplete` status code.
    AddressIncomplete,
    /// `Ambiguous` status code.
    Ambiguous,
    /// `Busy Here` status code.
    BusyHere,
    /// `Request Terminated` status code.
    RequestTerminated,
    /// `Not Acceptable Here` status code.
    NotAcceptableHere,
    /// `Request Pending` status code.
    RequestPending,
    /// `Server Internal Error` status code.
    ServerInternalError,
    /// `Not Implemented` status code.
    NotImplemented,
    /// `Bad Gateway` status code.
    BadGateway,
    /// `Service Unavailable` status code.
    ServiceUnavailable,
    /// `Server Time-out` status code.
    ServerTimeout,
    /// `Busy Everywhere` status code.
    BusyEverywhere,
    /// `Decline` status code.
    Decline,
    /// `Does Not Exist Anywhere` status code.
    DoesNotExistAnywhere,
    /// Any other status code.
    Other(u16),
}

impl StatusCode {
    /// Returns the numeric value of the status code.
    pub fn into_u16(self) -> u16 {
        match self {
            StatusCode::Trying => 100,
            StatusCode::Ringing => 180,
            StatusCode::CallIsBeingForwarded => 181,
            StatusCode::Queued => 182,
            StatusCode::SessionProgress => 183,
            StatusCode::Ok => 200,
            StatusCode::Accepted => 202,
            StatusCode::MultipleChoices => 300,
            StatusCode::MovedPermanently => 301,
            StatusCode::MovedTemporarily => 302,
            StatusCode::UseProxy => 305,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::NotAcceptable => 406,
            StatusCode::ProxyAuthenticationRequired => 407,
            StatusCode::RequestTimeout => 408,
            StatusCode::Gone => 410,
            StatusCode::UnsupportedMediaType => 415,
            StatusCode::UnsupportedUriScheme => 416,
            StatusCode::BadExtension => 420,
            StatusCode::IntervalTooBrief => 423,
            StatusCode::TemporarilyUnavailable => 480,
            StatusCode::CallOrTransactionDoesNotExist => 481,
            StatusCode::LoopDetected => 482,
            StatusCode::TooManyHops => 483,
            StatusCode::AddressIncomplete => 484,
            StatusCode::Ambiguous => 485,
            StatusCode::BusyHere => 486,
            StatusCode::RequestTerminated => 487,
            StatusCode::NotAcceptableHere => 488,
            StatusCode::RequestPending => 491,
            StatusCode::ServerInternalError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::BadGateway => 502,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::ServerTimeout => 504,
            StatusCode::BusyEverywhere => 600,
            StatusCode::Decline => 603,
            StatusCode::DoesNotExistAnywhere => 604,
            StatusCode::Other(code) => code,
        }
    }

    /// Returns the default reason phrase for this code.
    pub fn reason(&self) -> &'static str {
        match self {
            StatusCode::Trying => "Trying",
            StatusCode::Ringing => "Ringing",
            StatusCode::CallIsBeingForwarded => "Call Is Being Forwarded",
            StatusCode::Queued => "Queued",
            StatusCode::SessionProgress => "Session Progress",
            StatusCode::Ok => "OK",
            StatusCode::Accepted => "Accepted",
            StatusCode::MultipleChoices => "Multiple Choices",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::MovedTemporarily => "Moved Temporarily",
            StatusCode::UseProxy => "Use Proxy",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::NotAcceptable => "Not Acceptable",
            StatusCode::ProxyAuthenticationRequired => "Proxy Authentication Required",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::Gone => "Gone",
            StatusCode::UnsupportedMediaType => "Unsupported Media Type",
            StatusCode::UnsupportedUriScheme => "Unsupported URI Scheme",
            StatusCode::BadExtension => "Bad Extension",
            StatusCode::IntervalTooBrief => "Interval Too Brief",
            StatusCode::TemporarilyUnavailable => "Temporarily Unavailable",
            StatusCode::CallOrTransactionDoesNotExist => "Call/Transaction Does Not Exist",
            StatusCode::LoopDetected => "Loop Detected",
            StatusCode::TooManyHops => "Too Many Hops",
            StatusCode::AddressIncomplete => "Address Incomplete",
            StatusCode::Ambiguous => "Ambiguous",
            StatusCode::BusyHere => "Busy Here",
            StatusCode::RequestTerminated => "Request Terminated",
            StatusCode::NotAcceptableHere => "Not Acceptable Here",
            StatusCode::RequestPending => "Request Pending",
            StatusCode::ServerInternalError => "Server Internal Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::ServerTimeout => "Server Time-out",
            StatusCode::BusyEverywhere => "Busy Everywhere",
            StatusCode::Decline => "Decline",
            StatusCode::DoesNotExistAnywhere => "Does Not Exist Anywhere",
            StatusCode::Other(_) => "Unknown",
        }
    }

    /// Returns `true` for a 1xx code.
    pub fn is_provisional(&self) -> bool {
        matches!(self.into_u16(), 100..=199)
    }

    /// Returns `true` for any final (non-1xx) code.
    pub fn is_final(&self) -> bool {
        self.into_u16() >= 200
    }

    /// Returns `true` for a 2xx code.
    pub fn is_success(&self) -> bool {
        matches!(self.into_u16(), 200..=299)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        match code {
            100 => StatusCode::Trying,
            180 => StatusCode::Ringing,
            181 => StatusCode::CallIsBeingForwarded,
            182 => StatusCode::Queued,
            183 => StatusCode::SessionProgress,
            200 => StatusCode::Ok,
            202 => StatusCode::Accepted,
            300 => StatusCode::MultipleChoices,
            301 => StatusCode::MovedPermanently,
            302 => StatusCode::MovedTemporarily,
            305 => StatusCode::UseProxy,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            406 => StatusCode::NotAcceptable,
            407 => StatusCode::ProxyAuthenticationRequired,
            408 => StatusCode::RequestTimeout,
            410 => StatusCode::Gone,
            415 => StatusCode::UnsupportedMediaType,
            416 => StatusCode::UnsupportedUriScheme,
            420 => StatusCode::BadExtension,
            423 => StatusCode::IntervalTooBrief,
            480 => StatusCode::TemporarilyUnavailable,
            481 => StatusCode::CallOrTransactionDoesNotExist,
            482 => StatusCode::LoopDetected,
            483 => StatusCode::TooManyHops,
            484 => StatusCode::AddressIncomplete,
            485 => StatusCode::Ambiguous,
            486 => StatusCode::BusyHere,
            487 => StatusCode::RequestTerminated,
            488 => StatusCode::NotAcceptableHere,
            491 => StatusCode::RequestPending,
            500 => StatusCode::ServerInternalError,
            501 => StatusCode::NotImplemented,
            502 => StatusCode::BadGateway,
            503 => StatusCode::ServiceUnavailable,
            504 => StatusCode::ServerTimeout,
            600 => StatusCode::BusyEverywhere,
            603 => StatusCode::Decline,
            604 => StatusCode::DoesNotExistAnywhere,
            other => StatusCode::Other(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for code in [100u16, 180, 200, 401, 486, 487, 500, 603] {
            assert_eq!(StatusCode::from(code).into_u16(), code);
        }
        assert_eq!(StatusCode::from(699).into_u16(), 699);
    }

    #[test]
    fn test_classes() {
        assert!(StatusCode::Ringing.is_provisional());
        assert!(!StatusCode::Ringing.is_final());
        assert!(StatusCode::Ok.is_success());
        assert!(StatusCode::BusyHere.is_final());
        assert!(!StatusCode::BusyHere.is_success());
    }
}
