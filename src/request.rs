// src/request.rs
//! Turns the studio form into a provider-agnostic video generation request:
//! capped reference images plus a composed identity-preserving instruction.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GenerationError;
use crate::form::{AspectRatio, FormState};
use crate::intake::EncodedImage;

/// Subject references the provider accepts alongside a product reference
pub const MAX_SUBJECT_REFERENCES: usize = 2;
/// Total reference images the provider accepts per request
pub const MAX_REFERENCE_IMAGES: usize = 3;
pub const VIDEO_COUNT: u32 = 1;
/// The preview model only accepts reference images at 720p
pub const RESOLUTION: &str = "720p";

/// Everything captured from the form at submit time
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub subject_images: Vec<EncodedImage>,
    pub product_image: Option<EncodedImage>,
    pub aspect_ratio: AspectRatio,
    pub background_prompt: String,
    pub action_prompt: String,
    pub speech_prompt: String,
}

impl GenerationParams {
    /// Snapshot the form, dropping empty subject slots. Fails without any subject image.
    pub fn from_form(form: &FormState) -> Result<Self, GenerationError> {
        let subject_images: Vec<EncodedImage> = form.subject_images().cloned().collect();
        if subject_images.is_empty() {
            return Err(GenerationError::MissingSubjectImage);
        }

        Ok(Self {
            subject_images,
            product_image: form.product().cloned(),
            aspect_ratio: form.aspect_ratio,
            background_prompt: form.background_prompt.clone(),
            action_prompt: form.action_prompt.clone(),
            speech_prompt: form.speech_prompt.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceRole {
    /// Identity/appearance reference the output must reproduce
    Asset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub role: ReferenceRole,
}

impl ReferenceImage {
    fn asset(image: &EncodedImage) -> Result<Self, GenerationError> {
        let decoded = image.decode()?;
        Ok(Self {
            bytes: decoded.bytes,
            mime_type: decoded.mime_type,
            role: ReferenceRole::Asset,
        })
    }
}

/// First two subjects, then the product if there is room
pub fn build_reference_payload(params: &GenerationParams) -> Result<Vec<ReferenceImage>, GenerationError> {
    let mut references = params
        .subject_images
        .iter()
        .take(MAX_SUBJECT_REFERENCES)
        .map(ReferenceImage::asset)
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(product) = &params.product_image {
        if references.len() < MAX_REFERENCE_IMAGES {
            references.push(ReferenceImage::asset(product)?);
        }
    }

    Ok(references)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptLocale {
    #[default]
    #[serde(rename = "vi")]
    Vietnamese,
    #[serde(rename = "en")]
    English,
}

impl FromStr for PromptLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vi" | "vietnamese" => Ok(PromptLocale::Vietnamese),
            "en" | "english" => Ok(PromptLocale::English),
            other => Err(format!("unknown prompt locale '{}' (use vi or en)", other)),
        }
    }
}

struct PromptTemplate {
    task: &'static str,
    background_label: &'static str,
    action_label: &'static str,
    speech_label: &'static str,
    default_background: &'static str,
    default_action: &'static str,
    default_speech: &'static str,
    identity_rules: &'static str,
    product_rules: &'static str,
}

const VIETNAMESE: PromptTemplate = PromptTemplate {
    task: "NHIỆM VỤ:\nTạo video dựa trên hình ảnh chủ thể ở mục 1 hãy giữ nguyên 100% khuôn mặt, góc mặt.",
    background_label: "Bối cảnh",
    action_label: "Hành động của nhân vật",
    speech_label: "Lời nói / Biểu cảm",
    default_background: "Trong studio chuyên nghiệp",
    default_action: "Nhân vật đứng tự nhiên trước ống kính",
    default_speech: "Biểu cảm tự nhiên, hài lòng",
    identity_rules: "CÁC YÊU CẦU QUAN TRỌNG VỀ NHẬN DẠNG:\n\
- Giữ nguyên khuôn mặt nhân vật với độ chính xác tuyệt đối.\n\
- Không chỉnh sửa hình dạng khuôn mặt, không làm đẹp, không thay đổi tuổi tác, không làm mịn da.\n\
- Tỷ lệ khuôn mặt, mắt, mũi, môi, đường viền hàm phải giống hệt với hình ảnh gốc đã tải lên.",
    product_rules: "QUY TẮC BẢO TỒN SẢN PHẨM:\n\
- Mỗi sản phẩm phải giữ nguyên 100% về: hình dạng, thể tích, đường nét, tỷ lệ, chất liệu vải, đường may, logo, màu sắc và đặc tính vật liệu.\n\
- KHÔNG được làm thon gọn, chỉnh sửa, thay đổi kích thước, tạo kiểu, thiết kế lại hoặc diễn giải lại bất kỳ sản phẩm nào.",
};

const ENGLISH: PromptTemplate = PromptTemplate {
    task: "TASK:\nCreate a video from the subject images in section 1, keeping the face and face angles 100% unchanged.",
    background_label: "Background",
    action_label: "Character action",
    speech_label: "Speech / Expression",
    default_background: "In a professional studio",
    default_action: "The character stands naturally in front of the camera",
    default_speech: "Natural, satisfied expression",
    identity_rules: "CRITICAL IDENTITY REQUIREMENTS:\n\
- Preserve the character's face with absolute accuracy.\n\
- Do not reshape, beautify, age or smooth the face.\n\
- Face, eye, nose, lip and jawline proportions must match the uploaded images exactly.",
    product_rules: "PRODUCT PRESERVATION RULES:\n\
- Every product must stay 100% identical in shape, volume, lines, proportions, fabric, stitching, logo, color and material.\n\
- Do NOT slim, edit, resize, restyle, redesign or reinterpret any product.",
};

/// Progress and status lines shown while an operation runs
#[derive(Debug)]
pub struct ProgressText {
    pub starting: &'static str,
    pub request_initiated: &'static str,
    pub request_accepted: &'static str,
    pub still_generating: &'static str,
    pub poll_retry: &'static str,
    pub downloading: &'static str,
    pub completed: &'static str,
    pub error_prefix: &'static str,
}

const VIETNAMESE_PROGRESS: ProgressText = ProgressText {
    starting: "Bắt đầu khởi tạo...",
    request_initiated: "Đang khởi tạo yêu cầu AI...",
    request_accepted: "AI đã nhận yêu cầu. Đang xử lý... (Quá trình này có thể mất vài phút)",
    still_generating: "Đang tạo video... Vui lòng không đóng trình duyệt.",
    poll_retry: "Kiểm tra trạng thái thất bại, đang thử lại",
    downloading: "Video đã sẵn sàng, đang tải xuống...",
    completed: "Hoàn thành!",
    error_prefix: "Lỗi",
};

const ENGLISH_PROGRESS: ProgressText = ProgressText {
    starting: "Starting...",
    request_initiated: "Initializing AI request...",
    request_accepted: "AI accepted the request. Processing... (this can take a few minutes)",
    still_generating: "Generating video... please keep this session open.",
    poll_retry: "Status check failed, retrying",
    downloading: "Video ready, downloading...",
    completed: "Completed!",
    error_prefix: "Error",
};

impl PromptLocale {
    fn template(&self) -> &'static PromptTemplate {
        match self {
            PromptLocale::Vietnamese => &VIETNAMESE,
            PromptLocale::English => &ENGLISH,
        }
    }

    pub fn progress(&self) -> &'static ProgressText {
        match self {
            PromptLocale::Vietnamese => &VIETNAMESE_PROGRESS,
            PromptLocale::English => &ENGLISH_PROGRESS,
        }
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}

/// Compose the instruction sent to the model. Empty fields fall back to the
/// locale's default phrase; the identity and product rules are always present.
pub fn compose_prompt(params: &GenerationParams, locale: PromptLocale) -> String {
    let t = locale.template();
    format!(
        "{task}\n\n{bg_label}: {bg}\n{action_label}: {action}\n{speech_label}: {speech}\n\n{identity}\n\n{product}",
        task = t.task,
        bg_label = t.background_label,
        bg = or_default(&params.background_prompt, t.default_background),
        action_label = t.action_label,
        action = or_default(&params.action_prompt, t.default_action),
        speech_label = t.speech_label,
        speech = or_default(&params.speech_prompt, t.default_speech),
        identity = t.identity_rules,
        product = t.product_rules,
    )
}

/// Provider-agnostic submit payload
#[derive(Debug, Clone, PartialEq)]
pub struct VideoGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub reference_images: Vec<ReferenceImage>,
    pub number_of_videos: u32,
    pub resolution: &'static str,
    /// A preference only; the provider may pick another ratio
    pub aspect_ratio: AspectRatio,
}

impl VideoGenerationRequest {
    pub fn build(params: &GenerationParams, model: &str, locale: PromptLocale) -> Result<Self, GenerationError> {
        Ok(Self {
            model: model.to_string(),
            prompt: compose_prompt(params, locale),
            reference_images: build_reference_payload(params)?,
            number_of_videos: VIDEO_COUNT,
            resolution: RESOLUTION,
            aspect_ratio: params.aspect_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::SlotIndex;

    fn img(tag: &str) -> EncodedImage {
        EncodedImage::from_bytes("image/png", tag.as_bytes())
    }

    fn form_with(subjects: &[Option<&str>], product: Option<&str>) -> FormState {
        let mut form = FormState::new();
        for (i, subject) in subjects.iter().enumerate() {
            if let Some(tag) = subject {
                form.set_subject(SlotIndex::try_from(i).unwrap(), img(tag));
            }
        }
        if let Some(tag) = product {
            form.set_product(EncodedImage::from_bytes("image/jpeg", tag.as_bytes()));
        }
        form
    }

    #[test]
    fn test_empty_form_is_rejected() {
        let form = form_with(&[None, None, None, None], Some("product"));
        assert_eq!(GenerationParams::from_form(&form), Err(GenerationError::MissingSubjectImage));
    }

    #[test]
    fn test_params_drop_empty_slots_in_order() {
        let form = form_with(&[None, Some("b"), None, Some("d")], None);
        let params = GenerationParams::from_form(&form).unwrap();
        assert_eq!(params.subject_images, vec![img("b"), img("d")]);
        assert!(params.product_image.is_none());
    }

    #[test]
    fn test_reference_cap_for_every_subject_count() {
        for count in 1..=4 {
            for with_product in [false, true] {
                let subjects: Vec<Option<&str>> = ["s0", "s1", "s2", "s3"]
                    .iter()
                    .enumerate()
                    .map(|(i, tag)| if i < count { Some(*tag) } else { None })
                    .collect();
                let form = form_with(&subjects, with_product.then_some("prod"));
                let params = GenerationParams::from_form(&form).unwrap();
                let refs = build_reference_payload(&params).unwrap();

                let subject_refs = count.min(MAX_SUBJECT_REFERENCES);
                assert_eq!(refs.len(), subject_refs + usize::from(with_product));
                assert!(refs.len() <= MAX_REFERENCE_IMAGES);
                assert!(refs[..subject_refs].iter().all(|r| r.mime_type == "image/png"));
                if with_product {
                    assert_eq!(refs.last().unwrap().bytes, b"prod".to_vec());
                    assert_eq!(refs.last().unwrap().mime_type, "image/jpeg");
                }
            }
        }
    }

    #[test]
    fn test_two_subjects_plus_product_scenario() {
        let mut form = form_with(&[Some("A"), Some("B"), None, None], Some("C"));
        form.aspect_ratio = AspectRatio::Landscape;
        let params = GenerationParams::from_form(&form).unwrap();
        let request = VideoGenerationRequest::build(&params, "veo-test", PromptLocale::Vietnamese).unwrap();

        let payload: Vec<&[u8]> = request.reference_images.iter().map(|r| r.bytes.as_slice()).collect();
        assert_eq!(payload, vec![b"A".as_slice(), b"B".as_slice(), b"C".as_slice()]);
        assert!(request.reference_images.iter().all(|r| r.role == ReferenceRole::Asset));
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape);
        assert_eq!(request.number_of_videos, 1);
        assert_eq!(request.resolution, "720p");

        assert!(request.prompt.contains("Bối cảnh: Trong studio chuyên nghiệp"));
        assert!(request.prompt.contains("Hành động của nhân vật: Nhân vật đứng tự nhiên trước ống kính"));
        assert!(request.prompt.contains("Lời nói / Biểu cảm: Biểu cảm tự nhiên, hài lòng"));
    }

    #[test]
    fn test_user_text_replaces_defaults_and_rules_stay() {
        let mut form = form_with(&[Some("A")], None);
        form.background_prompt = "  A rooftop cafe at sunset ".to_string();
        form.speech_prompt = "Says hello".to_string();
        let params = GenerationParams::from_form(&form).unwrap();
        let prompt = compose_prompt(&params, PromptLocale::English);

        assert!(prompt.contains("Background: A rooftop cafe at sunset\n"));
        assert!(prompt.contains("Character action: The character stands naturally in front of the camera"));
        assert!(prompt.contains("Speech / Expression: Says hello"));
        assert!(prompt.contains("CRITICAL IDENTITY REQUIREMENTS"));
        assert!(prompt.contains("PRODUCT PRESERVATION RULES"));
    }

    #[test]
    fn test_malformed_image_surfaces_invalid_image() {
        let mut form = FormState::new();
        form.set_subject(SlotIndex::try_from(0).unwrap(), EncodedImage::from_data_url("garbage"));
        let params = GenerationParams::from_form(&form).unwrap();
        assert!(matches!(build_reference_payload(&params), Err(GenerationError::InvalidImage(_))));
    }
}
