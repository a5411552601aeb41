use regex::Regex;

const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Maps class ids from the model output to human-readable labels.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn coco() -> Self {
        Self::new(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
    }

    /// Parses the `names` entry Ultralytics writes into exported ONNX
    /// metadata, e.g. `{0: 'person', 1: 'knife'}`.
    ///
    /// Ids may be sparse; gaps are filled with `class{id}`.
    pub fn from_metadata(raw: &str) -> Option<Self> {
        let re = Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).ok()?;
        let mut pairs: Vec<(usize, String)> = re
            .captures_iter(raw)
            .filter_map(|cap| {
                let id = cap.get(1)?.as_str().parse().ok()?;
                let name = cap.get(2).or_else(|| cap.get(3))?.as_str().to_string();
                Some((id, name))
            })
            .collect();
        if pairs.is_empty() {
            return None;
        }
        pairs.sort_by_key(|(id, _)| *id);

        let len = pairs.last().map(|(id, _)| id + 1).unwrap_or(0);
        let mut names: Vec<String> = (0..len).map(|id| format!("class{id}")).collect();
        for (id, name) in pairs {
            names[id] = name;
        }
        Some(Self::new(names))
    }

    /// Fallback when the model carries no metadata.
    pub fn for_class_count(num_classes: usize) -> Self {
        if num_classes == COCO_CLASSES.len() {
            Self::coco()
        } else {
            Self::new((0..num_classes).map(|id| format!("class{id}")).collect())
        }
    }

    pub fn label(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{class_id}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
