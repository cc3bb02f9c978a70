use image::DynamicImage;

use crate::{error::Result, Token};

/// Anything that can turn an image into positioned text tokens.
pub trait TextRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<Token>>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&DynamicImage) -> Result<Vec<Token>>,
{
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<Token>> {
        self(image)
    }
}

/// Tokens recognized ahead of time, returned for any image.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedTokens(pub Vec<Token>);

impl TextRecognizer for PrecomputedTokens {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<Token>> {
        Ok(self.0.clone())
    }
}
