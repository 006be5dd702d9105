//! OpenAI adapter: chat completions for text steps, image generation for
//! scene images and thumbnails.

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http;
use super::{BaseAI, BaseImageGenerator};
use crate::common::{ContentOptimization, PipelineError, Platform};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "openai";

pub const CHAT_MODEL: &str = "gpt-4o";
pub const IMAGE_MODEL: &str = "dall-e-3";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

impl Message {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// OpenAI-backed [`BaseAI`] and [`BaseImageGenerator`].
///
/// Built without an API key, every call fails with a configuration error.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    image_model: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(180))?,
            base_url: OPENAI_API_URL.to_string(),
            api_key,
            chat_model: CHAT_MODEL.to_string(),
            image_model: IMAGE_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| PipelineError::configuration("OpenAI API key not configured").into())
    }

    async fn chat(
        &self,
        system: &str,
        prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let api_key = self.api_key()?;
        let start = Instant::now();

        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![Message::system(system), Message::user(prompt)],
            temperature,
            max_tokens,
        };

        let response: ChatResponse = http::json(
            PROVIDER,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await,
        )
        .await?;

        debug!(
            model = %self.chat_model,
            duration_ms = start.elapsed().as_millis() as u64,
            "OpenAI chat completion"
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::data("No response from OpenAI").into())
    }
}

/// Non-empty trimmed lines of a list-style completion.
fn lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop list markers like `1.`, `2)`, `-` or `*` at the start of a line.
fn strip_list_marker(line: &str) -> &str {
    let without_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = if without_digits.len() < line.len() {
        without_digits
            .strip_prefix('.')
            .or_else(|| without_digits.strip_prefix(')'))
            .unwrap_or(line)
    } else {
        line.strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line)
    };
    rest.trim()
}

pub(crate) fn parse_topics(content: &str) -> Vec<String> {
    lines(content)
        .iter()
        .map(|l| strip_list_marker(l).trim_matches('"').to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

pub(crate) fn parse_prompts(content: &str) -> Vec<String> {
    lines(content)
        .iter()
        .map(|l| strip_list_marker(l).to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

pub(crate) fn parse_hashtags(content: &str) -> Vec<String> {
    lines(content)
        .iter()
        .flat_map(|l| l.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .map(|t| strip_list_marker(&t).trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse the JSON object returned for a platform optimization.
///
/// A surrounding markdown code fence is tolerated; anything else that is not
/// a JSON object is a data error.
pub(crate) fn parse_optimization(content: &str) -> Result<ContentOptimization> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    #[derive(Deserialize)]
    struct Raw {
        #[serde(default)]
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        hashtags: Vec<String>,
    }

    let raw: Raw = serde_json::from_str(body)
        .map_err(|_| PipelineError::data("Failed to parse AI response"))?;

    Ok(ContentOptimization {
        title: raw.title,
        description: raw.description,
        hashtags: raw
            .hashtags
            .into_iter()
            .map(|t| t.trim().trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

fn platform_style(platform: Platform) -> &'static str {
    match platform {
        Platform::Youtube => "YouTube (longer descriptions, SEO-focused titles, educational tone)",
        Platform::Tiktok => "TikTok (short, catchy titles, trending hashtags, casual tone)",
        Platform::Instagram => {
            "Instagram (visual-focused descriptions, lifestyle hashtags, engaging tone)"
        }
        Platform::Facebook => {
            "Facebook (community-focused, longer descriptions, discussion-encouraging)"
        }
    }
}

#[async_trait]
impl BaseAI for OpenAiAdapter {
    async fn generate_script(&self, topic: &str, duration_secs: u32) -> Result<String> {
        let prompt = format!(
            "Create an engaging {duration_secs}-second video script about \"{topic}\".\n\
             The script should grab attention in the first second, be informative, include \
             natural pauses for visuals and end with a strong call-to-action.\n\
             Return only the narration text."
        );
        let script = self
            .chat(
                "You are a professional video script writer specializing in social media content.",
                prompt,
                0.7,
                1000,
            )
            .await?;

        if script.trim().is_empty() {
            return Err(PipelineError::data("AI returned an empty script").into());
        }
        Ok(script.trim().to_string())
    }

    async fn generate_image_prompts(&self, script: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Analyze this video script and generate 5-8 detailed image generation prompts for \
             its visual elements, in the order they appear:\n\nScript: \"{script}\"\n\n\
             Return only the image prompts, one per line."
        );
        let content = self
            .chat(
                "You are an expert at creating detailed prompts for AI image generation.",
                prompt,
                0.7,
                800,
            )
            .await?;
        Ok(parse_prompts(&content))
    }

    async fn generate_hashtags(&self, topic: &str, niche: &str) -> Result<Vec<String>> {
        let target = if niche == "general" {
            "for general social media use".to_string()
        } else {
            format!("optimized for {}", niche)
        };
        let prompt = format!(
            "Generate 15-20 relevant hashtags for a video about \"{topic}\" {target}. \
             Mix popular, niche-specific and long-tail hashtags. \
             Return only the hashtags without the # symbol, one per line."
        );
        let content = self
            .chat(
                "You are a social media hashtag expert who understands platform algorithms.",
                prompt,
                0.6,
                300,
            )
            .await?;
        Ok(parse_hashtags(&content))
    }

    async fn optimize_for_platform(
        &self,
        content: &str,
        platform: Platform,
    ) -> Result<ContentOptimization> {
        let title_limit = if platform == Platform::Youtube { 60 } else { 30 };
        let description_limit = if platform == Platform::Tiktok { 150 } else { 500 };
        let prompt = format!(
            "Optimize this video content for {style}:\n\nContent: \"{content}\"\n\n\
             Generate:\n\
             1. An optimized title ({title_limit} characters max)\n\
             2. A platform-appropriate description ({description_limit} characters max)\n\
             3. 10-15 relevant hashtags for this platform\n\n\
             Format as JSON: {{\"title\": \"...\", \"description\": \"...\", \"hashtags\": [\"tag1\", \"tag2\"]}}",
            style = platform_style(platform),
        );
        let system = format!(
            "You are a social media optimization expert specializing in {} content.",
            platform
        );
        let response = self.chat(&system, prompt, 0.6, 600).await?;
        parse_optimization(&response)
    }

    async fn discover_topics(&self, niche: &str) -> Result<Vec<String>> {
        let scope = if niche.trim().is_empty() {
            "across various categories".to_string()
        } else {
            format!("in the {} category", niche)
        };
        let prompt = format!(
            "Generate 10 trending and engaging video topics {scope}. Focus on topics that \
             would perform well on YouTube, TikTok and Instagram. \
             Return only the topic titles, one per line."
        );
        let content = self
            .chat(
                "You are a social media content strategist who identifies viral and trending topics.",
                prompt,
                0.8,
                500,
            )
            .await?;
        Ok(parse_topics(&content))
    }
}

#[async_trait]
impl BaseImageGenerator for OpenAiAdapter {
    async fn generate_image(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key()?;

        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: "1024x1792",
        };

        let response: ImageResponse = http::json(
            PROVIDER,
            self.client
                .post(format!("{}/images/generations", self.base_url))
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await,
        )
        .await?;

        response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PipelineError::data("OpenAI returned no image URL").into())
    }
}
