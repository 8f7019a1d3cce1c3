use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::client::LlmClient;
use crate::error::{GuardError, Result, validate};
use crate::models::{ContentKind, ContentRequest, GeneratedContent};

const PRODUCT_WORD_COUNT: u32 = 300;
const SOCIAL_WORD_COUNT: u32 = 150;
const PRODUCT_MAX_TOKENS: u32 = 2000;
const SOCIAL_MAX_TOKENS: u32 = 1000;
// Keeps `YYYYMMDD_<slug>.json` well under common filename limits.
const MAX_SLUG_CHARS: usize = 80;

/// Brand voice injected into every system prompt.
#[derive(Debug, Clone)]
pub struct BrandProfile {
    pub name: String,
    pub tagline: String,
    pub voice: String,
    pub audience: String,
    pub categories: Vec<String>,
}

/// Accepted word-count range for blog posts; `min` is also the default.
#[derive(Debug, Clone, Copy)]
pub struct WordLimits {
    pub min: u32,
    pub max: u32,
}

pub struct ContentGenerator {
    client: LlmClient,
    brand: BrandProfile,
    limits: WordLimits,
}

impl ContentGenerator {
    pub fn new(client: LlmClient, brand: BrandProfile, limits: WordLimits) -> Self {
        Self {
            client,
            brand,
            limits,
        }
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    /// Reject a request before any permit or provider call is spent.
    /// Returns the word count the prompt will ask for.
    pub fn check_request(&self, req: &ContentRequest) -> Result<u32> {
        validate(!req.topic.trim().is_empty(), "Topic cannot be empty")?;
        validate(
            req.keywords.iter().any(|k| !k.trim().is_empty()),
            "At least one keyword is required",
        )?;

        let word_count = match (req.content_type, req.word_count) {
            (ContentKind::BlogPost, Some(n)) => {
                validate(
                    (self.limits.min..=self.limits.max).contains(&n),
                    format!(
                        "Word count must be between {} and {}",
                        self.limits.min, self.limits.max
                    ),
                )?;
                n
            }
            (ContentKind::BlogPost, None) => self.limits.min,
            (_, Some(n)) => {
                validate(
                    n > 0 && n <= self.limits.max,
                    format!("Word count must be between 1 and {}", self.limits.max),
                )?;
                n
            }
            (ContentKind::ProductDescription, None) => PRODUCT_WORD_COUNT,
            (ContentKind::SocialPost, None) => SOCIAL_WORD_COUNT,
        };
        Ok(word_count)
    }

    pub async fn generate(&self, req: &ContentRequest) -> Result<GeneratedContent> {
        let word_count = self.check_request(req)?;
        let keywords: Vec<String> = req
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        info!(
            content_type = req.content_type.as_str(),
            topic = %req.topic,
            word_count,
            "generating content"
        );

        let system = self.system_prompt();
        let prompt = self.user_prompt(req, &keywords, word_count);
        let max_tokens = match req.content_type {
            ContentKind::BlogPost => None,
            ContentKind::ProductDescription => Some(PRODUCT_MAX_TOKENS),
            ContentKind::SocialPost => Some(SOCIAL_MAX_TOKENS),
        };

        let content = self
            .client
            .complete_with(&system, &prompt, max_tokens, |text| {
                parse_reply(req, &keywords, text)
            })
            .await?;

        info!(
            title = %content.title,
            words = content.word_count,
            "content generated"
        );
        Ok(content)
    }

    /// Generate each request in turn. A failed item is logged and the
    /// batch moves on; results line up with `reqs`.
    pub async fn generate_batch(&self, reqs: &[ContentRequest]) -> Vec<Result<GeneratedContent>> {
        let mut results = Vec::with_capacity(reqs.len());
        for (index, req) in reqs.iter().enumerate() {
            let result = self.generate(req).await;
            if let Err(e) = &result {
                warn!(index, topic = %req.topic, kind = %e.kind(), error = %e, "batch item failed");
            }
            results.push(result);
        }
        info!(
            total = reqs.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "batch finished"
        );
        results
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an expert content writer for {name}.\n\n\
             Brand Guidelines:\n\
             - Brand Name: {name}\n\
             - Tagline: {tagline}\n\
             - Voice: {voice}\n\
             - Target Audience: {audience}\n\
             - Product Categories: {categories}\n\n\
             Write conversationally but with authority, give specific actionable advice, \
             and always answer with a single JSON object and nothing else.",
            name = self.brand.name,
            tagline = self.brand.tagline,
            voice = self.brand.voice,
            audience = self.brand.audience,
            categories = self.brand.categories.join(", "),
        )
    }

    fn user_prompt(&self, req: &ContentRequest, keywords: &[String], word_count: u32) -> String {
        let keywords = keywords.join(", ");
        match req.content_type {
            ContentKind::BlogPost => format!(
                "Write a blog post about: {topic}\n\n\
                 - Target word count: {word_count} words\n\
                 - Keywords to incorporate naturally: {keywords}\n\
                 - Target audience: {audience}\n\
                 - Tone: {voice}\n\n\
                 Use a title of at most 60 characters that includes the primary keyword, \
                 markdown headers, short paragraphs and a closing call-to-action.\n\n\
                 Return JSON:\n\
                 {{\"title\": \"...\", \"content\": \"markdown body\", \
                 \"meta_description\": \"at most 155 characters\", \
                 \"secondary_keywords\": [\"...\"]}}",
                topic = req.topic,
                audience = self.brand.audience,
                voice = self.brand.voice,
            ),
            ContentKind::ProductDescription => {
                let details = req
                    .product_details
                    .as_ref()
                    .and_then(|d| serde_json::to_string_pretty(d).ok())
                    .unwrap_or_else(|| "{}".to_string());
                format!(
                    "Write a product description for: {topic}\n\n\
                     Product Context:\n{details}\n\n\
                     - Word count: {word_count} words\n\
                     - Keywords: {keywords}\n\
                     - Focus on benefits, address customer pain points\n\n\
                     Return JSON:\n\
                     {{\"headline\": \"...\", \"short_description\": \"...\", \
                     \"long_description\": \"...\", \"features_and_benefits\": [\"...\"], \
                     \"meta_description\": \"...\"}}",
                    topic = req.topic,
                )
            }
            ContentKind::SocialPost => {
                let platform = platform_of(req);
                format!(
                    "Create a {platform} post about: {topic}\n\n\
                     - Optimal length: ~{limit} characters\n\
                     - Keywords: {keywords}\n\
                     - Brand voice: {voice}\n\n\
                     Hook the reader in the first line and end with a natural call-to-action.\n\n\
                     Return JSON:\n\
                     {{\"caption\": \"...\", \"hashtags\": [\"...\"], \"call_to_action\": \"...\"}}",
                    topic = req.topic,
                    limit = optimal_length(&platform),
                    voice = self.brand.voice,
                )
            }
        }
    }
}

#[derive(Deserialize)]
struct BlogReply {
    title: String,
    content: String,
    meta_description: String,
    #[serde(default)]
    secondary_keywords: Vec<String>,
}

#[derive(Deserialize)]
struct ProductReply {
    headline: String,
    short_description: String,
    long_description: String,
    #[serde(default)]
    features_and_benefits: Vec<String>,
    meta_description: String,
}

#[derive(Deserialize)]
struct SocialReply {
    caption: String,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    call_to_action: String,
}

/// Turn the model's JSON reply into `GeneratedContent`.
///
/// Any reply that is not the expected JSON shape is a `MalformedResponse`.
pub fn parse_reply(
    req: &ContentRequest,
    keywords: &[String],
    text: &str,
) -> Result<GeneratedContent> {
    let (title, content, meta_description, keywords) = match req.content_type {
        ContentKind::BlogPost => {
            let reply: BlogReply = decode(text)?;
            let keywords = if reply.secondary_keywords.is_empty() {
                keywords.to_vec()
            } else {
                reply.secondary_keywords
            };
            (reply.title, reply.content, reply.meta_description, keywords)
        }
        ContentKind::ProductDescription => {
            let reply: ProductReply = decode(text)?;
            let mut content = format!(
                "# {}\n\n{}\n\n{}\n",
                reply.headline, reply.short_description, reply.long_description
            );
            if !reply.features_and_benefits.is_empty() {
                content.push_str("\n## Key Features & Benefits\n");
                for item in &reply.features_and_benefits {
                    content.push_str(&format!("- {item}\n"));
                }
            }
            (reply.headline, content, reply.meta_description, keywords.to_vec())
        }
        ContentKind::SocialPost => {
            let reply: SocialReply = decode(text)?;
            let platform = platform_of(req);
            let mut content = reply.caption.clone();
            if !reply.call_to_action.is_empty() {
                content.push_str("\n\n");
                content.push_str(&reply.call_to_action);
            }
            if !reply.hashtags.is_empty() {
                let tags: Vec<String> = reply
                    .hashtags
                    .iter()
                    .map(|t| format!("#{}", t.trim_start_matches('#')))
                    .collect();
                content.push_str("\n\n");
                content.push_str(&tags.join(" "));
            }
            let title = format!("{platform} post: {}", req.topic);
            (title, content, reply.call_to_action, keywords.to_vec())
        }
    };

    validate_field(&title, "title")?;
    validate_field(&content, "content")?;

    Ok(GeneratedContent {
        word_count: content.split_whitespace().count(),
        title,
        content,
        meta_description,
        keywords,
        created_at: Utc::now(),
        content_type: req.content_type,
    })
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(strip_code_fence(text))?)
}

fn validate_field(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GuardError::MalformedResponse(format!(
            "reply has an empty {field}"
        )));
    }
    Ok(())
}

/// Models often wrap JSON in a ```json fence; take what is inside.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. "json") on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn platform_of(req: &ContentRequest) -> String {
    req.platform
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("instagram")
        .to_lowercase()
}

fn optimal_length(platform: &str) -> u32 {
    match platform {
        "instagram" => 125,
        "tiktok" => 100,
        "pinterest" => 200,
        "facebook" => 40,
        _ => 150,
    }
}

/// Write `content` as pretty JSON to `dir/YYYYMMDD_<slug>.json`.
pub fn save_content(content: &GeneratedContent, dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let filename = format!(
        "{}_{}.json",
        content.created_at.format("%Y%m%d"),
        slugify(&content.title)
    );
    let path = dir.join(filename);
    let json = serde_json::to_string_pretty(content)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), "saved content");
    Ok(path)
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if slug.chars().count() >= MAX_SLUG_CHARS {
            break;
        }
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}
