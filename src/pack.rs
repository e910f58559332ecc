//! Buffer packing and section offset bookkeeping.
//!
//! [`merge`] concatenates element arrays and reports where each input landed.
//! [`LayoutBuilder`] appends named sections into one `u32` word buffer and
//! hands back an immutable [`BufferLayout`] so offsets can never drift from
//! the data they describe.

use std::fmt;

use bytemuck::Pod;

/// Concatenate `arrays` in order.
///
/// Returns the merged array and, for every input, the element index at which
/// it starts. `offsets[0] == 0` whenever at least one array is given.
pub fn merge<T, A>(arrays: &[A]) -> (Vec<T>, Vec<usize>)
where
    T: Clone,
    A: AsRef<[T]>,
{
    let total: usize = arrays.iter().map(|a| a.as_ref().len()).sum();
    let mut merged = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(arrays.len());
    for array in arrays {
        offsets.push(merged.len());
        merged.extend_from_slice(array.as_ref());
    }
    (merged, offsets)
}

/// Named sections of the three GPU buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    // Scene buffer
    Instances,
    MeshDescriptors,
    Materials,
    Lights,
    LightCdf,
    // Geometry buffer
    Vertices,
    Indices,
    SubmeshRoots,
    PrimitiveMaterials,
    // Acceleration buffer
    Tlas,
    Blas,
}

impl Section {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Instances => "instances",
            Self::MeshDescriptors => "mesh_descriptors",
            Self::Materials => "materials",
            Self::Lights => "lights",
            Self::LightCdf => "light_cdf",
            Self::Vertices => "vertices",
            Self::Indices => "indices",
            Self::SubmeshRoots => "submesh_roots",
            Self::PrimitiveMaterials => "primitive_materials",
            Self::Tlas => "tlas",
            Self::Blas => "blas",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placement of one section inside a word buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRange {
    /// First word of the section.
    pub offset: usize,
    /// Section length in words.
    pub len: usize,
}

impl SectionRange {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Immutable description of a packed buffer: section order, offsets, lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferLayout {
    sections: Vec<(Section, SectionRange)>,
}

impl BufferLayout {
    /// Range of `section`, if it was appended.
    pub fn get(&self, section: Section) -> Option<SectionRange> {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, r)| *r)
    }

    /// Word offset of `section` as written into the frame uniforms.
    ///
    /// Missing sections report the end of the buffer, which is an empty range.
    pub fn offset(&self, section: Section) -> u32 {
        self.get(section)
            .map(|r| r.offset)
            .unwrap_or_else(|| self.total_words()) as u32
    }

    /// Total buffer length in words.
    pub fn total_words(&self) -> usize {
        self.sections.last().map(|(_, r)| r.end()).unwrap_or(0)
    }

    /// Total buffer length in bytes.
    pub fn total_bytes(&self) -> u64 {
        (self.total_words() * 4) as u64
    }

    /// Sections in buffer order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, SectionRange)> + '_ {
        self.sections.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Appends sections of `Pod` records into one `u32` word buffer.
///
/// Every record type must be a whole number of 4-byte words; the GPU side
/// reads all three buffers as `array<u32>` and bitcasts floats.
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    words: Vec<u32>,
    layout: BufferLayout,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `records` as `section` and return its range.
    pub fn push<T: Pod>(&mut self, section: Section, records: &[T]) -> SectionRange {
        debug_assert!(
            self.layout.get(section).is_none(),
            "section {section} appended twice"
        );
        let words: &[u32] = bytemuck::cast_slice(records);
        let range = SectionRange {
            offset: self.words.len(),
            len: words.len(),
        };
        self.words.extend_from_slice(words);
        self.layout.sections.push((section, range));
        range
    }

    /// Builder-style [`push`](Self::push).
    pub fn section<T: Pod>(mut self, section: Section, records: &[T]) -> Self {
        self.push(section, records);
        self
    }

    /// Finish and return the word buffer with its layout.
    pub fn finish(self) -> (Vec<u32>, BufferLayout) {
        (self.words, self.layout)
    }
}
