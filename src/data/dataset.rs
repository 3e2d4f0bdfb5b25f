use anyhow::Result;

use crate::domain::{example::Example, traits::DatasetSource};

/// The built-in assistant corpus: (text, intent), in order.
const ASSISTANT_CORPUS: &[(&str, &str)] = &[
    // Weather
    ("What's the weather like?", "weather"),
    ("How's the weather today?", "weather"),
    ("Is it going to rain?", "weather"),
    ("What's the temperature?", "weather"),
    ("Will it be sunny tomorrow?", "weather"),
    ("Check the weather forecast", "weather"),
    ("Is it cold outside?", "weather"),
    ("What's the weather forecast for this week?", "weather"),
    // Time
    ("What time is it?", "time"),
    ("Tell me the current time", "time"),
    ("What's the time now?", "time"),
    ("Show me the clock", "time"),
    ("What time is it in New York?", "time"),
    ("Current time please", "time"),
    // Greetings
    ("Hello", "greeting"),
    ("Hi there", "greeting"),
    ("Good morning", "greeting"),
    ("Good evening", "greeting"),
    ("Hey", "greeting"),
    ("How are you?", "greeting"),
    ("Nice to meet you", "greeting"),
    ("Greetings", "greeting"),
    // Music
    ("Play some music", "music"),
    ("Play my favorite song", "music"),
    ("Turn on the radio", "music"),
    ("Play rock music", "music"),
    ("Start the music player", "music"),
    ("I want to listen to music", "music"),
    ("Play something upbeat", "music"),
    // Calendar
    ("What's on my calendar?", "calendar"),
    ("Show me my schedule", "calendar"),
    ("Do I have any meetings today?", "calendar"),
    ("What's my next appointment?", "calendar"),
    ("Check my calendar", "calendar"),
    ("Schedule a meeting", "calendar"),
    // News
    ("What's in the news?", "news"),
    ("Show me the latest news", "news"),
    ("Tell me about current events", "news"),
    ("What's happening in the world?", "news"),
    ("Read me the news", "news"),
    ("Any breaking news?", "news"),
    // Help
    ("Help me", "help"),
    ("What can you do?", "help"),
    ("Tell me a joke", "help"),
    ("How do I use this app?", "help"),
    ("What are your features?", "help"),
    ("Show me the menu", "help"),
];

/// Calibration inputs for full-integer quantization.
pub const REPRESENTATIVE_SENTENCES: &[&str] = &[
    "What's the weather like?",
    "What time is it?",
    "Hello there",
    "Play some music",
    "Show me my calendar",
    "What's in the news?",
    "Help me with this",
    "Good morning",
    "Is it going to rain?",
    "Play my favorite song",
    "What's on my schedule?",
    "Tell me a joke",
    "How's the weather today?",
    "What's the current time?",
    "Hi there",
    "Turn on the radio",
    "Check my appointments",
    "What's happening in the world?",
    "What can you do?",
    "Good evening",
];

/// Smoke-test inputs run through every exported graph.
pub const VALIDATION_SENTENCES: &[&str] = &[
    "What's the weather like?",
    "What time is it?",
    "Hello there",
    "Play some music",
];

/// Serves the built-in corpus.
pub struct EmbeddedSource;

impl DatasetSource for EmbeddedSource {
    fn load_all(&self) -> Result<Vec<Example>> {
        Ok(ASSISTANT_CORPUS
            .iter()
            .map(|(text, intent)| Example::new(*text, *intent))
            .collect())
    }
}

/// One example after preprocessing: padded ids plus one-hot target.
#[derive(Debug, Clone)]
pub struct EncodedExample {
    pub token_ids: Vec<i32>,
    pub one_hot:   Vec<f32>,
}

impl EncodedExample {
    /// Class index of the one-hot target.
    pub fn class_index(&self) -> usize {
        self.one_hot
            .iter()
            .position(|&v| v == 1.0)
            .unwrap_or(0)
    }
}
