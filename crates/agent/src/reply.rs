/// What the model sent back, split into prose and an optional code block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelReply {
    Answer(String),
    Snippet { language: Option<String>, code: String, commentary: String },
}

const FENCE: &str = "```";

/// Splits out the first fenced code block, if there is a complete one.
pub fn parse_reply(text: &str) -> ModelReply {
    let Some(open) = text.find(FENCE) else {
        return ModelReply::Answer(text.trim().to_string());
    };

    let after_open = &text[open + FENCE.len()..];
    let (info, body) = match after_open.split_once('\n') {
        Some((info, body)) => (info.trim(), body),
        None => return ModelReply::Answer(text.trim().to_string()),
    };

    let Some(close) = body.find(FENCE) else {
        return ModelReply::Answer(text.trim().to_string());
    };

    let code = body[..close].trim_end().to_string();
    let before = text[..open].trim();
    let after = body[close + FENCE.len()..].trim();
    let commentary = [before, after].into_iter().filter(|part| !part.is_empty()).collect::<Vec<_>>();

    ModelReply::Snippet {
        language: (!info.is_empty()).then(|| info.to_ascii_lowercase()),
        code,
        commentary: commentary.join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_reply, ModelReply};

    #[test]
    fn plain_text_is_an_answer() {
        assert_eq!(
            parse_reply("  The pipeline totals 750.\n"),
            ModelReply::Answer("The pipeline totals 750.".to_string())
        );
    }

    #[test]
    fn fenced_python_becomes_a_snippet() {
        let reply = parse_reply(
            "Here is how:\n```python\nresult = df_deals['Deal Value'].sum()\n```\nRun it on the deals table.",
        );

        assert_eq!(
            reply,
            ModelReply::Snippet {
                language: Some("python".to_string()),
                code: "result = df_deals['Deal Value'].sum()".to_string(),
                commentary: "Here is how:\n\nRun it on the deals table.".to_string(),
            }
        );
    }

    #[test]
    fn fence_without_language_is_still_a_snippet() {
        let reply = parse_reply("```\nSELECT 1\n```");
        assert!(matches!(
            reply,
            ModelReply::Snippet { language: None, ref code, ref commentary }
                if code == "SELECT 1" && commentary.is_empty()
        ));
    }

    #[test]
    fn unterminated_fence_is_treated_as_prose() {
        let reply = parse_reply("Answer: ```python\nresult = 1");
        assert!(matches!(reply, ModelReply::Answer(_)));
    }
}
