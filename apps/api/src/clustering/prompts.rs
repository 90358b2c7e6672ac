// All model prompt constants for the clustering pipeline.

/// Per-item yes/no statistics probe. Replace `{preview}` before sending.
pub const STATISTICS_PROMPT_TEMPLATE: &str = r#"Does this text contain statistical data, numbers, percentages, or quantitative information?

Text: "{preview}"

Answer with ONLY "yes" or "no" (no explanation needed)."#;

/// Batched clustering prompt. Replace `{snippets}` before sending.
/// The reply contract is JSON-only; the parser still defends against
/// commentary and code fences the model may add anyway.
pub const CLUSTER_PROMPT_TEMPLATE: &str = r#"You are an AI assistant that analyzes text snippets and groups them into meaningful collections.

Analyze these text snippets and identify common themes, topics, or subjects. Group similar snippets together and suggest collection names.

Snippets:
{snippets}

Instructions:
1. Identify 3-8 meaningful collections based on topics, themes, or subjects
2. Each collection should have a clear, descriptive name (1-3 words)
3. Assign each snippet to ONE most relevant collection
4. Use semantic similarity, not just keyword matching

Respond ONLY with valid JSON in this exact format:
{
  "collections": [
    {
      "name": "Collection Name",
      "description": "Brief description",
      "itemIndices": [0, 2, 5]
    }
  ]
}"#;
