//! Decoded pictures.
//!
//! Pictures are stored as owned planes (Y, U, V for the 4:2:0 content MPEG
//! streams carry). A picture handed over by a decoder backend belongs to the
//! caller once returned; nothing here keeps references into decoder
//! buffers.

use crate::error::D2vError;

/// Coding type of a decoded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureType {
    /// Intra-coded.
    I,
    /// Predicted.
    P,
    /// Bi-directionally predicted.
    B,
}

impl PictureType {
    /// Single-letter name (`"I"`, `"P"`, `"B"`).
    pub fn as_str(self) -> &'static str {
        match self {
            PictureType::I => "I",
            PictureType::P => "P",
            PictureType::B => "B",
        }
    }
}

/// Field structure of an output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOrder {
    /// Progressive frame.
    Progressive,
    /// Interlaced, bottom field first.
    BottomFieldFirst,
    /// Interlaced, top field first.
    TopFieldFirst,
}

impl FieldOrder {
    /// The `_FieldBased` convention: 0 progressive, 1 BFF, 2 TFF.
    pub fn as_field_based(self) -> u8 {
        match self {
            FieldOrder::Progressive => 0,
            FieldOrder::BottomFieldFirst => 1,
            FieldOrder::TopFieldFirst => 2,
        }
    }
}

/// One image plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    /// Row-major sample bytes, `stride` bytes per row.
    pub data: Vec<u8>,
    /// Bytes per row in `data`.
    pub stride: usize,
    /// Visible bytes per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Plane {
    /// A zero-filled, tightly packed plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            stride: width,
            width,
            height,
        }
    }

    /// Copy visible rows out of a strided buffer.
    pub fn from_strided(source: &[u8], stride: usize, width: usize, height: usize) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            let start = row * stride;
            data.extend_from_slice(&source[start..start + width]);
        }
        Self {
            data,
            stride: width,
            width,
            height,
        }
    }

    /// Visible bytes of one row.
    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.stride;
        &self.data[start..start + self.width]
    }

    fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let start = row * self.stride;
        &mut self.data[start..start + self.width]
    }
}

/// A decoded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    /// Luma width in pixels.
    pub width: u32,
    /// Luma height in pixels.
    pub height: u32,
    /// Planes in Y, U, V order.
    pub planes: Vec<Plane>,
}

impl Picture {
    /// Returns `true` when the picture carries no plane data.
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Crop or pad to `width` x `height` luma pixels.
    ///
    /// Subsampled planes scale with the luma plane. Padding repeats the last
    /// column and row.
    pub fn fit(&self, width: u32, height: u32) -> Picture {
        if width == self.width && height == self.height {
            return self.clone();
        }

        let planes = self
            .planes
            .iter()
            .map(|plane| {
                let target_width =
                    scaled_dimension(plane.width, self.width as usize, width as usize);
                let target_height =
                    scaled_dimension(plane.height, self.height as usize, height as usize);
                let mut fitted = Plane::new(target_width, target_height);

                if plane.width == 0 || plane.height == 0 {
                    return fitted;
                }

                for row in 0..target_height {
                    let source = plane.row(row.min(plane.height - 1));
                    let destination = fitted.row_mut(row);
                    let copied = target_width.min(plane.width);
                    destination[..copied].copy_from_slice(&source[..copied]);
                    let edge = source[plane.width - 1];
                    destination[copied..].fill(edge);
                }
                fitted
            })
            .collect();

        Picture {
            width,
            height,
            planes,
        }
    }
}

/// Scale a plane dimension along with its luma dimension, rounding up.
fn scaled_dimension(plane: usize, luma: usize, target_luma: usize) -> usize {
    if luma == 0 {
        return 0;
    }
    (plane * target_luma).div_ceil(luma)
}

/// Build a frame from the even lines of `top` and the odd lines of
/// `bottom`.
///
/// # Errors
///
/// Returns [`D2vError::StructuralInconsistency`] if the two pictures do not
/// share the same geometry.
pub fn weave_fields(top: &Picture, bottom: &Picture) -> Result<Picture, D2vError> {
    let same_geometry = top.width == bottom.width
        && top.height == bottom.height
        && top.planes.len() == bottom.planes.len()
        && top
            .planes
            .iter()
            .zip(&bottom.planes)
            .all(|(t, b)| t.width == b.width && t.height == b.height);
    if !same_geometry {
        return Err(D2vError::StructuralInconsistency(format!(
            "cannot weave fields of {}x{} and {}x{} pictures",
            top.width, top.height, bottom.width, bottom.height
        )));
    }

    let planes = top
        .planes
        .iter()
        .zip(&bottom.planes)
        .map(|(top_plane, bottom_plane)| {
            let mut woven = Plane::new(top_plane.width, top_plane.height);
            for row in 0..top_plane.height {
                let source = if row % 2 == 0 { top_plane } else { bottom_plane };
                woven.row_mut(row).copy_from_slice(source.row(row));
            }
            woven
        })
        .collect();

    Ok(Picture {
        width: top.width,
        height: top.height,
        planes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, value: u8) -> Picture {
        let luma = Plane {
            data: vec![value; (width * height) as usize],
            stride: width as usize,
            width: width as usize,
            height: height as usize,
        };
        let chroma_width = (width / 2) as usize;
        let chroma_height = (height / 2) as usize;
        let chroma = Plane {
            data: vec![value; chroma_width * chroma_height],
            stride: chroma_width,
            width: chroma_width,
            height: chroma_height,
        };
        Picture {
            width,
            height,
            planes: vec![luma, chroma.clone(), chroma],
        }
    }

    #[test]
    fn weave_alternates_lines() {
        let woven = weave_fields(&filled(4, 4, 10), &filled(4, 4, 20)).unwrap();
        let luma = &woven.planes[0];
        assert_eq!(luma.row(0), &[10; 4]);
        assert_eq!(luma.row(1), &[20; 4]);
        assert_eq!(luma.row(2), &[10; 4]);
        assert_eq!(luma.row(3), &[20; 4]);
        assert_eq!(woven.planes[1].row(1), &[20; 2]);
    }

    #[test]
    fn weave_rejects_mismatched_sizes() {
        assert!(weave_fields(&filled(4, 4, 0), &filled(8, 4, 0)).is_err());
    }

    #[test]
    fn fit_crops_subsampled_planes() {
        let cropped = filled(16, 32, 1).fit(10, 20);
        assert_eq!(cropped.planes[0].width, 10);
        assert_eq!(cropped.planes[0].height, 20);
        assert_eq!(cropped.planes[1].width, 5);
        assert_eq!(cropped.planes[1].height, 10);
    }

    #[test]
    fn fit_pads_with_edge_samples() {
        let padded = filled(2, 2, 7).fit(4, 4);
        assert_eq!(padded.planes[0].row(3), &[7; 4]);
    }

    #[test]
    fn strided_copy_drops_padding() {
        let source = [1, 2, 0, 0, 3, 4, 0, 0];
        let plane = Plane::from_strided(&source, 4, 2, 2);
        assert_eq!(plane.data, vec![1, 2, 3, 4]);
    }
}
