// src/form.rs
//! Studio form: four subject slots, one product slot, prompts and aspect ratio.
//! Mutations never validate; that happens when a submission is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::intake::EncodedImage;

pub const SUBJECT_SLOT_COUNT: usize = 4;

/// Index of a subject slot, always in `0..SUBJECT_SLOT_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn get(self) -> usize {
        self.0
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SUBJECT_SLOT_COUNT).map(SlotIndex)
    }
}

impl TryFrom<usize> for SlotIndex {
    type Error = String;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        if index < SUBJECT_SLOT_COUNT {
            Ok(SlotIndex(index))
        } else {
            Err(format!(
                "Subject slot {} out of range (expected 0..={})",
                index,
                SUBJECT_SLOT_COUNT - 1
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(format!("Unsupported aspect ratio '{}' (use 16:9 or 9:16)", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    subjects: [Option<EncodedImage>; SUBJECT_SLOT_COUNT],
    product: Option<EncodedImage>,
    pub background_prompt: String,
    pub action_prompt: String,
    pub speech_prompt: String,
    pub aspect_ratio: AspectRatio,
}

/// Serializable view of the form for the HTTP surface
#[derive(Debug, Clone, Serialize)]
pub struct FormSnapshot {
    pub subject_images: Vec<Option<EncodedImage>>,
    pub filled_subject_slots: usize,
    pub product_image: Option<EncodedImage>,
    pub background_prompt: String,
    pub action_prompt: String,
    pub speech_prompt: String,
    pub aspect_ratio: AspectRatio,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_subject(&mut self, index: SlotIndex, image: EncodedImage) {
        self.subjects[index.get()] = Some(image);
    }

    pub fn clear_subject(&mut self, index: SlotIndex) {
        self.subjects[index.get()] = None;
    }

    pub fn subject(&self, index: SlotIndex) -> Option<&EncodedImage> {
        self.subjects[index.get()].as_ref()
    }

    /// Filled slots in slot order
    pub fn subject_images(&self) -> impl Iterator<Item = &EncodedImage> {
        self.subjects.iter().flatten()
    }

    pub fn set_product(&mut self, image: EncodedImage) {
        self.product = Some(image);
    }

    pub fn clear_product(&mut self) {
        self.product = None;
    }

    pub fn product(&self) -> Option<&EncodedImage> {
        self.product.as_ref()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            subject_images: self.subjects.to_vec(),
            filled_subject_slots: self.subject_images().count(),
            product_image: self.product.clone(),
            background_prompt: self.background_prompt.clone(),
            action_prompt: self.action_prompt.clone(),
            speech_prompt: self.speech_prompt.clone(),
            aspect_ratio: self.aspect_ratio,
        }
    }
}
