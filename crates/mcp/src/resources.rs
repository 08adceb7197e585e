// Static discovery catalogs served through resources/list and resources/read

use crate::protocol::{ResourceContents, ResourceDescriptor};
use crate::service::Service;
use genmedia_core::{ToolError, ToolResult};
use serde_json::json;

pub const VOICES_URI: &str = "chirp3://voices";
pub const SEGMENTATION_CLASSES_URI: &str = "imagen://segmentation_classes";
pub const OPERATIONS_URI: &str = "avtool://operations";

/// Chirp 3 HD voice personas and their voice gender.
const CHIRP3_PERSONAS: [(&str, &str); 30] = [
    ("Achernar", "FEMALE"),
    ("Achird", "MALE"),
    ("Algenib", "MALE"),
    ("Algieba", "MALE"),
    ("Alnilam", "MALE"),
    ("Aoede", "FEMALE"),
    ("Autonoe", "FEMALE"),
    ("Callirrhoe", "FEMALE"),
    ("Charon", "MALE"),
    ("Despina", "FEMALE"),
    ("Enceladus", "MALE"),
    ("Erinome", "FEMALE"),
    ("Fenrir", "MALE"),
    ("Gacrux", "FEMALE"),
    ("Iapetus", "MALE"),
    ("Kore", "FEMALE"),
    ("Laomedeia", "FEMALE"),
    ("Leda", "FEMALE"),
    ("Orus", "MALE"),
    ("Puck", "MALE"),
    ("Pulcherrima", "FEMALE"),
    ("Rasalgethi", "MALE"),
    ("Sadachbia", "MALE"),
    ("Sadaltager", "MALE"),
    ("Schedar", "MALE"),
    ("Sulafat", "FEMALE"),
    ("Umbriel", "MALE"),
    ("Vindemiatrix", "FEMALE"),
    ("Zephyr", "FEMALE"),
    ("Zubenelgenubi", "MALE"),
];

/// Imagen semantic segmentation classes, indexed by class id.
const SEGMENTATION_CLASSES: [&str; 194] = [
    "backpack", "umbrella", "bag", "tie", "suitcase", "case", "bird", "cat", "dog", "horse",
    "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "animal (other)", "microwave",
    "radiator", "oven", "toaster", "storage tank", "conveyor belt", "sink", "refrigerator",
    "washer dryer", "fan", "dishwasher", "toilet", "bathtub", "shower", "tunnel", "bridge",
    "pier wharf", "tent", "building", "ceiling", "laptop", "keyboard", "mouse", "remote",
    "cell phone", "television", "floor", "stage", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "fruit (other)", "food (other)",
    "chair (other)", "armchair", "swivel chair", "stool", "seat", "couch", "trash can",
    "potted plant", "nightstand", "bed", "table", "pool table", "barrel", "desk", "ottoman",
    "wardrobe", "crib", "basket", "chest of drawers", "bookshelf", "counter (other)",
    "bathroom counter", "kitchen island", "door", "light (other)", "lamp", "sconce",
    "chandelier", "mirror", "whiteboard", "shelf", "stairs", "escalator", "cabinet",
    "fireplace", "stove", "arcade machine", "gravel", "platform", "playingfield", "railroad",
    "road", "snow", "sidewalk pavement", "runway", "terrain", "book", "box", "clock", "vase",
    "scissors", "plaything (other)", "teddy bear", "hair dryer", "toothbrush", "painting",
    "poster", "bulletin board", "bottle", "cup", "wine glass", "knife", "fork", "spoon", "bowl",
    "tray", "range hood", "plate", "person", "rider (other)", "bicyclist", "motorcyclist",
    "paper", "streetlight", "road barrier", "mailbox", "cctv camera", "junction box",
    "traffic sign", "traffic light", "fire hydrant", "parking meter", "bench", "bike rack",
    "billboard", "sky", "pole", "fence", "railing banister", "guard rail", "mountain hill",
    "rock", "frisbee", "skis", "snowboard", "sports ball", "kite", "baseball bat",
    "baseball glove", "skateboard", "surfboard", "tennis racket", "net", "base", "sculpture",
    "column", "fountain", "awning", "apparel", "banner", "flag", "blanket", "curtain (other)",
    "shower curtain", "pillow", "towel", "rug floormat", "vegetation", "bicycle", "car",
    "autorickshaw", "motorcycle", "airplane", "bus", "train", "truck", "trailer", "boat ship",
    "slow wheeled object", "river lake", "sea", "water (other)", "swimming pool", "waterfall",
    "wall", "window", "window blind",
];

pub const SEGMENTATION_CLASS_COUNT: usize = SEGMENTATION_CLASSES.len();

/// Resources advertised by `service`.
pub fn list(service: Service) -> Vec<ResourceDescriptor> {
    let descriptor = |uri: &str, name: &str, description: &str| ResourceDescriptor {
        uri: uri.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        mime_type: "application/json".to_string(),
    };
    match service {
        Service::Chirp3 => vec![descriptor(
            VOICES_URI,
            "Chirp 3 HD voices",
            "Voice personas usable as <locale>-Chirp3-HD-<persona>",
        )],
        Service::Imagen => vec![descriptor(
            SEGMENTATION_CLASSES_URI,
            "Segmentation classes",
            "Class ids accepted by imagen_edit in the semantic mask mode",
        )],
        Service::Avtool => vec![descriptor(
            OPERATIONS_URI,
            "Compositing operations",
            "The media operations this server can perform",
        )],
        Service::Veo | Service::Lyria => Vec::new(),
    }
}

/// Contents of `uri`, if `service` serves it.
pub fn read(service: Service, uri: &str) -> ToolResult<ResourceContents> {
    if !list(service).iter().any(|resource| resource.uri == uri) {
        return Err(ToolError::invalid(format!("unknown resource: {}", uri)));
    }
    let body = match uri {
        VOICES_URI => json!(CHIRP3_PERSONAS
            .iter()
            .map(|(persona, gender)| json!({ "persona": persona, "gender": gender }))
            .collect::<Vec<_>>()),
        SEGMENTATION_CLASSES_URI => json!(SEGMENTATION_CLASSES
            .iter()
            .enumerate()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>()),
        _ => json!(Service::Avtool
            .tools()
            .iter()
            .map(|tool| json!({ "tool": tool.as_str(), "description": tool.description() }))
            .collect::<Vec<_>>()),
    };
    let text = serde_json::to_string_pretty(&body)
        .map_err(|e| ToolError::Internal(format!("failed to encode resource: {}", e)))?;
    Ok(ResourceContents {
        uri: uri.to_string(),
        mime_type: "application/json".to_string(),
        text,
    })
}

/// Persona names, for prompt argument hints.
pub fn persona_names() -> impl Iterator<Item = &'static str> {
    CHIRP3_PERSONAS.iter().map(|(persona, _)| *persona)
}
