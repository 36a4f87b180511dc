//! Integration tests for parley.
//! The driver tests run against a scripted service.  The live test is ignored by default; run it
//! with `--ignored` and an API key in the environment.

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use futures::{StreamExt, stream};

    use parley::chat::{ChatConfig, Driver, Exit, Input, LineReader, Renderer, Settings};
    use parley::{
        ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ChunkStream, CompletionService,
        Model, OpenAi, Result, TokenCounter,
    };

    #[derive(Clone, Default)]
    struct Service {
        replies: Arc<Mutex<VecDeque<Vec<&'static str>>>>,
        requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
    }

    #[async_trait::async_trait]
    impl CompletionService for Service {
        async fn stream_completion(&self, request: ChatCompletionRequest) -> Result<ChunkStream> {
            self.requests.lock().unwrap().push(request);
            let fragments = self.replies.lock().unwrap().pop_front().unwrap_or_default();
            let chunks: Vec<Result<ChatCompletionChunk>> = fragments
                .into_iter()
                .map(|f| Ok(ChatCompletionChunk::text(f)))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    #[derive(Default)]
    struct Screen {
        output: String,
        warnings: Vec<String>,
    }

    impl Renderer for Screen {
        fn print_text(&mut self, text: &str) {
            self.output.push_str(text);
        }

        fn finish_response(&mut self) {
            self.output.push('\n');
        }

        fn print_info(&mut self, _: &str) {}

        fn print_warning(&mut self, warning: &str) {
            self.warnings.push(warning.to_string());
        }

        fn print_error(&mut self, _: &str) {}
    }

    struct Keyboard {
        lines: VecDeque<&'static str>,
        prompts: usize,
    }

    impl Keyboard {
        fn typing(lines: &[&'static str]) -> Self {
            Self {
                lines: lines.iter().copied().collect(),
                prompts: 0,
            }
        }
    }

    impl LineReader for Keyboard {
        fn read_line(&mut self, _: &str) -> Result<Input> {
            self.prompts += 1;
            Ok(self
                .lines
                .pop_front()
                .map(|l| Input::Line(l.to_string()))
                .unwrap_or(Input::Eof))
        }
    }

    #[tokio::test]
    async fn terse_conversation() {
        let service = Service::default();
        service.replies.lock().unwrap().push_back(vec!["Hel", "lo"]);
        let config = ChatConfig::new().without_color();
        let keyboard = Keyboard::typing(&["You are terse.", "Hi", ":quit"]);
        let mut driver = Driver::new(service.clone(), config, Screen::default(), keyboard);

        let exit = driver.run().await.unwrap();

        assert_eq!(exit, Exit::Quit);
        assert_eq!(driver.renderer().output, "Hello\n");
        assert_eq!(driver.reader().prompts, 3);
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].stream);
        assert_eq!(requests[0].model, Model::Gpt35Turbo);
        assert_eq!(
            requests[0].messages,
            vec![ChatMessage::system("You are terse."), ChatMessage::user("Hi")]
        );
    }

    #[test]
    fn unsupported_model_is_refused() {
        let service = Service::default();
        let keyboard = Keyboard::typing(&["sys", ":model gpt-9", "Hi"]);
        let config = ChatConfig::new();
        let mut driver = Driver::new(service.clone(), config, Screen::default(), keyboard);

        let exit = tokio_test::block_on(driver.run()).unwrap();

        assert_eq!(exit, Exit::EndOfInput);
        assert_eq!(driver.renderer().warnings.len(), 1);
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, Model::Gpt35Turbo);
    }

    #[tokio::test]
    async fn budget_is_charged_per_exchange() {
        let mut settings = Settings::default();
        settings.toggle_continuing();
        let service = Service::default();
        for _ in 0..3 {
            service.replies.lock().unwrap().push_back(vec!["Sure", "."]);
        }
        let config = ChatConfig::new().with_settings(settings);
        let keyboard = Keyboard::typing(&["sys", "one", "two", "three"]);
        let mut driver = Driver::new(service.clone(), config, Screen::default(), keyboard);

        driver.run().await.unwrap();

        let counter = TokenCounter::for_model(Model::Gpt35Turbo).unwrap();
        let requests = service.requests.lock().unwrap();
        let mut used = 0u32;
        for request in requests.iter() {
            assert_eq!(request.max_tokens, 1000 - used);
            used += (counter.count_history(&request.messages).unwrap() + counter.count("Sure."))
                as u32;
        }
    }

    #[tokio::test]
    #[ignore] // Requires a real API key
    async fn test_live_streaming_response() {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: OPENAI_API_KEY not set");
            return;
        }

        let client = OpenAi::new(api_key).expect("Failed to create client");
        let request = ChatCompletionRequest::new(
            Model::Gpt35Turbo,
            vec![ChatMessage::user("Count to 3")],
            0.0,
            20,
        )
        .streaming();

        let mut stream = client
            .stream_completion(request)
            .await
            .expect("Stream request should succeed");
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            if let Some(text) = chunk.expect("chunk").content() {
                reply.push_str(text);
            }
        }
        assert!(!reply.is_empty());
    }
}
