#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Ort(#[from] ort::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Model binding error: {0}")]
    ModelBinding(String),
    #[error("Expected {expected} values but got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Score at index {index} is not a number")]
    InvalidScore { index: usize },
    #[error("No image has been selected")]
    NoImageSelected,
}

pub type Result<T> = std::result::Result<T, Error>;

pub const INVALID_IMAGE_MESSAGE: &str = "Choose a valid image";
pub const NO_IMAGE_MESSAGE: &str = "First choose an image";
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "The classifier model could not be loaded";
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong while classifying the image";

impl Error {
    /// The text shown to the end user. Never includes internal details;
    /// log the error itself for those.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::InvalidImage(_) => INVALID_IMAGE_MESSAGE,
            Error::NoImageSelected => NO_IMAGE_MESSAGE,
            Error::ModelBinding(_) => MODEL_UNAVAILABLE_MESSAGE,
            _ => INTERNAL_ERROR_MESSAGE,
        }
    }

    /// Fatal errors mean nothing can be classified for the rest of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ModelBinding(_))
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
      S: serde::ser::Serializer,
    {
      serializer.serialize_str(self.to_string().as_ref())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_user_messages_hide_details()
    {
        let err = Error::InvalidImage("decoder said: truncated PNG chunk".to_string());
        assert_eq!(err.user_message(), INVALID_IMAGE_MESSAGE);

        assert_eq!(Error::NoImageSelected.user_message(), NO_IMAGE_MESSAGE);

        let err = Error::DimensionMismatch { expected: 10, actual: 9 };
        assert_eq!(err.user_message(), INTERNAL_ERROR_MESSAGE);

        let err = Error::ModelBinding("could not load model \"models/cifar10.onnx\": protobuf parsing failed".to_string());
        assert_eq!(err.user_message(), MODEL_UNAVAILABLE_MESSAGE);
        assert!(!err.user_message().contains("cifar10.onnx"));
    }

    #[test]
    fn test_only_binding_errors_are_fatal()
    {
        assert!(Error::ModelBinding("missing".to_string()).is_fatal());
        assert!(!Error::NoImageSelected.is_fatal());
        assert!(!Error::InvalidImage("empty".to_string()).is_fatal());
        assert!(!Error::DimensionMismatch { expected: 10, actual: 11 }.is_fatal());
    }

    #[test]
    fn test_serializes_as_display_string()
    {
        let err = Error::DimensionMismatch { expected: 10, actual: 11 };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Expected 10 values but got 11\"");
    }
}
