//! Error types shared across the application.
//!
//! There are two kinds of failures a handler can produce: a control-flow
//! redirect (most prominently the authentication gate sending an anonymous
//! visitor to the login page) and an actual error. Both are carried by
//! [`Error`] so handlers can bubble either with `?`. Actual errors are
//! converted into user-safe pages at the edge by [`pages::error_pages`];
//! their details are never rendered directly.

pub(crate) mod pages;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};

/// A result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error that can occur while handling a request.
pub struct Error {
    inner: Box<ErrorImpl>,
}

enum ErrorImpl {
    Internal {
        source: Box<dyn StdError + Send + Sync>,
        status: StatusCode,
    },
    /// A control-flow exit: the response is a redirect, optionally carrying
    /// `Set-Cookie` headers (e.g. a session-clearing cookie).
    Redirect {
        location: String,
        set_cookie: Vec<String>,
    },
}

impl Error {
    /// Creates a new error with a 500 Internal Server Error status code.
    #[must_use]
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::with_status(error, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Creates a new error with a specific HTTP status code.
    #[must_use]
    pub fn with_status<E>(error: E, status: StatusCode) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            inner: Box::new(ErrorImpl::Internal {
                source: error.into(),
                status,
            }),
        }
    }

    /// Creates a "303 See Other" control-flow redirect.
    #[must_use]
    pub fn see_other<L: Into<String>>(location: L) -> Self {
        Self::see_other_with_cookies(location, Vec::new())
    }

    /// Creates a "303 See Other" redirect carrying `Set-Cookie` headers.
    #[must_use]
    pub fn see_other_with_cookies<L: Into<String>>(location: L, set_cookie: Vec<String>) -> Self {
        Self {
            inner: Box::new(ErrorImpl::Redirect {
                location: location.into(),
                set_cookie,
            }),
        }
    }

    /// Returns the HTTP status code the response for this error will carry.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match &*self.inner {
            ErrorImpl::Internal { status, .. } => *status,
            ErrorImpl::Redirect { .. } => StatusCode::SEE_OTHER,
        }
    }

    /// Whether this error is a control-flow redirect rather than a fault.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(&*self.inner, ErrorImpl::Redirect { .. })
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorImpl::Internal { source, status } => f
                .debug_struct("Error")
                .field("source", source)
                .field("status", status)
                .finish(),
            ErrorImpl::Redirect { location, .. } => {
                f.debug_struct("Error").field("redirect", location).finish()
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorImpl::Internal { source, .. } => Display::fmt(source, f),
            ErrorImpl::Redirect { location, .. } => write!(f, "redirect to {location}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &*self.inner {
            ErrorImpl::Internal { source, .. } => source.source(),
            ErrorImpl::Redirect { .. } => None,
        }
    }
}

/// The error text attached to a failed response, picked up by the error page
/// layer. A separate private type so handlers cannot interact with it through
/// response extensions by accident.
#[derive(Debug, Clone)]
pub(crate) struct ErrorDetail(pub(crate) Arc<str>);

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match *self.inner {
            ErrorImpl::Redirect {
                location,
                set_cookie,
            } => {
                let mut builder = Response::builder()
                    .status(StatusCode::SEE_OTHER)
                    .header(header::LOCATION, location);
                for cookie in set_cookie {
                    builder = builder.header(header::SET_COOKIE, cookie);
                }
                builder
                    .body(axum::body::Body::empty())
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
            ErrorImpl::Internal { source, status } => {
                let mut detail = source.to_string();
                let mut cause = source.source();
                while let Some(inner) = cause {
                    detail.push_str(": ");
                    detail.push_str(&inner.to_string());
                    cause = inner.source();
                }

                let mut response = status.into_response();
                response
                    .extensions_mut()
                    .insert(ErrorDetail(Arc::from(detail)));
                response
            }
        }
    }
}

/// Implements `From<$ty> for Error` for a leaf error type.
macro_rules! impl_into_error {
    ($error_ty:ty) => {
        impl From<$error_ty> for $crate::error::Error {
            fn from(err: $error_ty) -> Self {
                $crate::error::Error::internal(err)
            }
        }
    };
    ($error_ty:ty, $status_code:ident) => {
        impl From<$error_ty> for $crate::error::Error {
            fn from(err: $error_ty) -> Self {
                $crate::error::Error::with_status(err, http::StatusCode::$status_code)
            }
        }
    };
}
pub(crate) use impl_into_error;
