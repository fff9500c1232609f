use std::fmt;

#[derive(Debug)]
pub enum OnePageError {
    UnplaceableFlowable(String),
    InvalidConfiguration(String),
    Layout(String),
    Pdf(String),
    Asset(String),
    Io(std::io::Error),
}

impl fmt::Display for OnePageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnePageError::UnplaceableFlowable(message) => {
                write!(f, "flowable cannot fit on any page: {}", message)
            }
            OnePageError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            OnePageError::Layout(message) => write!(f, "layout error: {}", message),
            OnePageError::Pdf(message) => write!(f, "pdf error: {}", message),
            OnePageError::Asset(message) => write!(f, "asset error: {}", message),
            OnePageError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for OnePageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OnePageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OnePageError {
    fn from(value: std::io::Error) -> Self {
        OnePageError::Io(value)
    }
}

impl From<lopdf::Error> for OnePageError {
    fn from(value: lopdf::Error) -> Self {
        OnePageError::Pdf(value.to_string())
    }
}
