//! TTS renderer: text + voice profile in, WAV clip on disk out.

mod renderer;

pub use renderer::TtsRenderer;
