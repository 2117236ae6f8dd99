use std::fmt;

mod reqwest;
pub(crate) use self::reqwest::*;

impl Response {
    pub fn status(&self) -> StatusCode {
        StatusCode {
            inner: self.inner.status(),
        }
    }

    pub fn text(self) -> Result<String, Error> {
        self.inner.text()
    }

    /// Read and drop the body so the connection can be reused.
    pub fn discard(mut self) -> Result<(), Error> {
        self.inner.copy_to(&mut std::io::sink())?;
        Ok(())
    }
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        self.inner.as_u16()
    }

    pub fn is_no_content(&self) -> bool {
        self.inner == ::reqwest::StatusCode::NO_CONTENT
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}
