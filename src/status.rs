//! Status codes the response writer can emit.
//!
//! The writer carries a fixed reason-phrase table. A code outside it is
//! refused at write time with [`Error::UnknownStatusCode`].
//!
//! ```rust
//! use wireline::Status;
//!
//! assert_eq!(u16::from(Status::NotFound), 404);
//! assert_eq!(Status::try_from(500u16).unwrap().reason(), "Internal Server Error");
//! assert!(Status::try_from(418u16).is_err());
//! ```

use crate::error::Error;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    Ok,                  // 200
    BadRequest,          // 400
    NotFound,            // 404
    InternalServerError, // 500
}

impl Status {
    /// The reason phrase written after the code on the status line.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                  => "OK",
            Self::BadRequest          => "Bad Request",
            Self::NotFound            => "Not Found",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::BadRequest          => 400,
            Status::NotFound            => 404,
            Status::InternalServerError => 500,
        }
    }
}

impl TryFrom<u16> for Status {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self, Error> {
        match code {
            200 => Ok(Self::Ok),
            400 => Ok(Self::BadRequest),
            404 => Ok(Self::NotFound),
            500 => Ok(Self::InternalServerError),
            _   => Err(Error::UnknownStatusCode(code)),
        }
    }
}
