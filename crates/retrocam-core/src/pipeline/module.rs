use crate::config::FilterConfig;
use crate::error::Result;
use crate::image_buf::ImageBuf;

/// A single step in the processing pipeline.
pub trait ProcessingModule: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf>;
}
