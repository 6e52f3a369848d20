mod mock_translation_engine;

pub use mock_translation_engine::MockTranslationEngine;
