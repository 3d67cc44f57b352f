//! Built-in model catalogue and descriptor lookup.

/// Models offered out of the box, in cycling order.
pub const AVAILABLE_MODELS: &[&str] = &[
    "gemini-2.5-flash-image-landscape",
    "gemini-2.5-flash-image-portrait",
    "gemini-3.0-pro-image-landscape",
    "gemini-3.0-pro-image-portrait",
    "imagen-4.0-generate-preview-landscape",
    "imagen-4.0-generate-preview-portrait",
];

/// Family-level details keyed by identifier substring.
const FAMILIES: &[(&str, &str, &str, &str)] = &[
    (
        "gemini-2.5-flash",
        "Gemini 2.5 Flash",
        "fast inference, cost-effective",
        "everyday creation, quick turnaround",
    ),
    (
        "gemini-3.0-pro",
        "Gemini 3.0 Pro",
        "advanced reasoning, high-quality output",
        "professional work, high quality requirements",
    ),
    (
        "imagen-4.0",
        "Imagen 4.0",
        "top-tier image generation, strong artistic style",
        "artistic creation, high visual quality",
    ),
];

/// Orientation details keyed by identifier substring.
const ORIENTATIONS: &[(&str, &str, &str)] = &[
    ("landscape", "Landscape (16:9)", "suited to scenery, scenes and widescreen images"),
    ("portrait", "Portrait (9:16)", "suited to portraits, character art and mobile display"),
];

/// Human-readable facts about a model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Display name.
    pub name: &'static str,
    /// Generation type.
    pub kind: &'static str,
    /// Output orientation.
    pub orientation: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Capabilities summary.
    pub capabilities: &'static str,
    /// Recommended use.
    pub recommended_use: &'static str,
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self {
            name: "Unknown model",
            kind: "Unknown type",
            orientation: "Unknown orientation",
            description: "No description",
            capabilities: "Unknown",
            recommended_use: "General",
        }
    }
}

/// Describe `model_id` by substring matching; unknown parts keep defaults.
#[must_use]
pub fn describe(model_id: &str) -> ModelDescriptor {
    let mut descriptor = ModelDescriptor::default();

    if let Some(&(_, name, capabilities, recommended_use)) =
        FAMILIES.iter().find(|(key, ..)| model_id.contains(key))
    {
        descriptor.name = name;
        descriptor.kind = "image/text-to-image";
        descriptor.capabilities = capabilities;
        descriptor.recommended_use = recommended_use;
    }

    if let Some(&(_, orientation, description)) =
        ORIENTATIONS.iter().find(|(key, ..)| model_id.contains(key))
    {
        descriptor.orientation = orientation;
        descriptor.description = description;
    }

    descriptor
}
