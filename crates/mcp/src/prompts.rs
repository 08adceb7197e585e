// Prompt templates served through prompts/list and prompts/get

use crate::protocol::{GetPromptResult, PromptArgument, PromptDescriptor, PromptMessage};
use crate::resources;
use crate::service::Service;
use genmedia_core::{ToolError, ToolResult};
use std::collections::HashMap;

struct Template {
    name: &'static str,
    description: &'static str,
    arguments: &'static [(&'static str, &'static str, bool)],
    render: fn(&Args<'_>) -> Vec<PromptMessage>,
}

/// Argument access for a render function. Required arguments are checked
/// before rendering, so `get` on them always yields a value.
struct Args<'a>(&'a HashMap<String, String>);

impl Args<'_> {
    fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or_default()
    }

    fn or<'s>(&'s self, name: &str, fallback: &'s str) -> &'s str {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(fallback)
    }
}

const IMAGEN: &[Template] = &[Template {
    name: "generate-image",
    description: "Create an image from a subject and an optional style",
    arguments: &[
        ("subject", "What the image should show", true),
        ("style", "Visual style, e.g. watercolor or photorealistic", false),
        ("aspect_ratio", "One of 1:1, 3:4, 4:3, 9:16, 16:9", false),
    ],
    render: |args| {
        vec![PromptMessage::user(format!(
            "Use imagen_t2i to generate an image of {} in a {} style with aspect ratio {}. \
             Describe the lighting and composition in the prompt.",
            args.get("subject"),
            args.or("style", "photorealistic"),
            args.or("aspect_ratio", "1:1"),
        ))]
    },
}];

const VEO: &[Template] = &[Template {
    name: "generate-video",
    description: "Create a short video clip from a scene description",
    arguments: &[
        ("scene", "What happens in the clip", true),
        ("duration", "Clip length in seconds (5-8)", false),
    ],
    render: |args| {
        vec![
            PromptMessage::user(format!(
                "Use veo_t2v to create a {} second video of: {}",
                args.or("duration", "5"),
                args.get("scene"),
            )),
            PromptMessage::assistant(
                "Video generation takes a few minutes. I will describe camera movement and \
                 pacing in the prompt, then report where the clip was stored.",
            ),
        ]
    },
}];

const CHIRP3: &[Template] = &[
    Template {
        name: "speak-text",
        description: "Read text aloud with a Chirp 3 HD voice",
        arguments: &[
            ("text", "The text to speak", true),
            ("persona", "Voice persona such as Zephyr or Puck", false),
            ("language_code", "BCP-47 language code", false),
        ],
        render: |args| {
            let language = args.or("language_code", "en-US");
            vec![PromptMessage::user(format!(
                "Use chirp_tts with voice_name {}-Chirp3-HD-{} to say: {}",
                language,
                args.or("persona", "Zephyr"),
                args.get("text"),
            ))]
        },
    },
    Template {
        name: "list-voices",
        description: "Find the Chirp 3 HD voices for a language",
        arguments: &[("language", "BCP-47 language code", true)],
        render: |args| {
            let personas: Vec<&str> = resources::persona_names().take(5).collect();
            vec![PromptMessage::user(format!(
                "Use list_chirp_voices for {} and summarize the voices by gender. \
                 Personas include {} and others.",
                args.get("language"),
                personas.join(", "),
            ))]
        },
    },
];

const LYRIA: &[Template] = &[Template {
    name: "compose-music",
    description: "Compose an instrumental clip for a mood",
    arguments: &[
        ("mood", "Mood or genre of the music", true),
        ("avoid", "Elements the music should not contain", false),
    ],
    render: |args| {
        let mut text = format!(
            "Use lyria_generate_music to compose an instrumental piece that feels {}.",
            args.get("mood")
        );
        let avoid = args.or("avoid", "");
        if !avoid.is_empty() {
            text.push_str(&format!(" Pass \"{}\" as the negative prompt.", avoid));
        }
        vec![PromptMessage::user(text)]
    },
}];

const AVTOOL: &[Template] = &[Template {
    name: "combine-media",
    description: "Put a soundtrack under a video and make a GIF preview",
    arguments: &[
        ("video_uri", "Video file path or gs:// URI", true),
        ("audio_uri", "Audio file path or gs:// URI", true),
    ],
    render: |args| {
        vec![
            PromptMessage::user(format!(
                "Combine the video {} with the audio {}.",
                args.get("video_uri"),
                args.get("audio_uri"),
            )),
            PromptMessage::assistant(
                "I will call ffmpeg_combine_audio_and_video first, then run \
                 ffmpeg_video_to_gif on the result for a preview.",
            ),
        ]
    },
}];

fn templates(service: Service) -> &'static [Template] {
    match service {
        Service::Imagen => IMAGEN,
        Service::Veo => VEO,
        Service::Chirp3 => CHIRP3,
        Service::Lyria => LYRIA,
        Service::Avtool => AVTOOL,
    }
}

/// Prompts advertised by `service`.
pub fn list(service: Service) -> Vec<PromptDescriptor> {
    templates(service)
        .iter()
        .map(|template| PromptDescriptor {
            name: template.name.to_string(),
            description: template.description.to_string(),
            arguments: template
                .arguments
                .iter()
                .map(|(name, description, required)| PromptArgument {
                    name: name.to_string(),
                    description: description.to_string(),
                    required: *required,
                })
                .collect(),
        })
        .collect()
}

/// Render prompt `name` with `arguments`.
pub fn get(
    service: Service,
    name: &str,
    arguments: &HashMap<String, String>,
) -> ToolResult<GetPromptResult> {
    let template = templates(service)
        .iter()
        .find(|template| template.name == name)
        .ok_or_else(|| ToolError::invalid(format!("unknown prompt: {}", name)))?;

    for (arg, _, required) in template.arguments {
        let present = arguments.get(*arg).is_some_and(|v| !v.trim().is_empty());
        if *required && !present {
            return Err(ToolError::invalid(format!(
                "prompt {} requires argument `{}`",
                name, arg
            )));
        }
    }

    Ok(GetPromptResult {
        description: template.description.to_string(),
        messages: (template.render)(&Args(arguments)),
    })
}
