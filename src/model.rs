use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    Objects,
    People,
    Caption,
    DenseCaptions,
    Tags,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Objects => "objects",
            Feature::People => "people",
            Feature::Caption => "caption",
            Feature::DenseCaptions => "denseCaptions",
            Feature::Tags => "tags",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentMode {
    BackgroundRemoval,
    ForegroundMatting,
}

impl SegmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentMode::BackgroundRemoval => "backgroundRemoval",
            SegmentMode::ForegroundMatting => "foregroundMatting",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct Values<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct Caption {
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct DenseCaption {
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct Tag {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl DetectedObject {
    /// The service ranks tags by confidence; the first one names the object.
    pub fn top_tag(&self) -> Option<&Tag> {
        self.tags.first()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPerson {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

/// Body of a successful `imageanalysis:analyze` call.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub model_version: Option<String>,
    pub metadata: Option<ImageMetadata>,
    pub caption_result: Option<Caption>,
    pub dense_captions_result: Option<Values<DenseCaption>>,
    pub objects_result: Option<Values<DetectedObject>>,
    pub people_result: Option<Values<DetectedPerson>>,
    pub tags_result: Option<Values<Tag>>,
}

impl AnalysisResult {
    pub fn objects(&self) -> &[DetectedObject] {
        self.objects_result.as_ref().map_or(&[], |r| &r.values)
    }

    pub fn people(&self) -> &[DetectedPerson] {
        self.people_result.as_ref().map_or(&[], |r| &r.values)
    }

    pub fn tags(&self) -> &[Tag] {
        self.tags_result.as_ref().map_or(&[], |r| &r.values)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct ReadLine {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadPage {
    #[serde(default)]
    pub lines: Vec<ReadLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadResult {
    #[serde(default)]
    pub pages: Vec<ReadPage>,
}

/// Body returned while polling a read operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOperation {
    pub status: OperationStatus,
    pub analyze_result: Option<ReadResult>,
    pub error: Option<ServiceError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ServiceError,
}
