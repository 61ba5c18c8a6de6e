use std::io::Cursor;

use image::{imageops, RgbImage};
use log::{debug, warn};

/// Reads the EXIF orientation tag from an encoded image.
/// Images with no EXIF data (or data we can't read) are assumed to be upright, i.e. 1.
pub fn read_orientation(bytes: &[u8]) -> u32
{
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor)
    {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No usable EXIF data, assuming upright image: {}", e);
            return 1;
        }
    };

    // Orientation is stored as a SHORT, but readers should accept BYTE, SHORT
    // or LONG for any unsigned integer field, which `get_uint` handles.
    match exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        Some(orientation) => orientation.value.get_uint(0).unwrap_or(1),
        None => 1,
    }
}

/// Turns a camera photo upright given its EXIF orientation, stored as a value 1-8, where:
/// 1 = 0 degrees: the correct orientation, no adjustment is required.
/// 2 = 0 degrees, mirrored: image has been flipped back-to-front.
/// 3 = 180 degrees: image is upside down.
/// 4 = 180 degrees, mirrored: image has been flipped back-to-front and is upside down.
/// 5 = 90 degrees: image has been flipped back-to-front and is on its side.
/// 6 = 90 degrees, mirrored: image is on its side.
/// 7 = 270 degrees: image has been flipped back-to-front and is on its far side.
/// 8 = 270 degrees, mirrored: image is on its far side.
pub fn fix_orientation(image: &mut RgbImage, orientation: u32)
{
    match orientation
    {
        1 => {},
        2 => imageops::flip_horizontal_in_place(image),
        3 => imageops::rotate180_in_place(image),
        4 => imageops::flip_vertical_in_place(image),
        5 => {
            *image = imageops::rotate90(image);
            imageops::flip_horizontal_in_place(image);
        },
        6 => *image = imageops::rotate90(image),
        7 => {
            *image = imageops::rotate270(image);
            imageops::flip_horizontal_in_place(image);
        },
        8 => *image = imageops::rotate270(image),
        _ => {
            warn!("Unsupported EXIF orientation: {}", orientation);
        }
    }
}

#[cfg(test)]
mod tests
{
    use image::Rgb;

    use super::*;

    const A: Rgb<u8> = Rgb([255, 0, 0]);
    const B: Rgb<u8> = Rgb([0, 0, 255]);

    // A single row: A then B.
    fn two_pixels() -> RgbImage
    {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, A);
        image.put_pixel(1, 0, B);
        image
    }

    #[test]
    fn test_upright_and_unknown_orientations_are_untouched()
    {
        for orientation in [1, 0, 9, 42]
        {
            let mut image = two_pixels();
            fix_orientation(&mut image, orientation);
            assert_eq!(image, two_pixels());
        }
    }

    #[test]
    fn test_mirrored_and_upside_down()
    {
        let mut mirrored = two_pixels();
        fix_orientation(&mut mirrored, 2);
        assert_eq!((*mirrored.get_pixel(0, 0), *mirrored.get_pixel(1, 0)), (B, A));

        let mut upside_down = two_pixels();
        fix_orientation(&mut upside_down, 3);
        assert_eq!((*upside_down.get_pixel(0, 0), *upside_down.get_pixel(1, 0)), (B, A));
    }

    #[test]
    fn test_rotations_swap_dimensions()
    {
        let mut clockwise = two_pixels();
        fix_orientation(&mut clockwise, 6);
        assert_eq!(clockwise.dimensions(), (1, 2));
        assert_eq!((*clockwise.get_pixel(0, 0), *clockwise.get_pixel(0, 1)), (A, B));

        let mut counter_clockwise = two_pixels();
        fix_orientation(&mut counter_clockwise, 8);
        assert_eq!(counter_clockwise.dimensions(), (1, 2));
        assert_eq!((*counter_clockwise.get_pixel(0, 0), *counter_clockwise.get_pixel(0, 1)), (B, A));
    }

    #[test]
    fn test_missing_exif_means_upright()
    {
        assert_eq!(read_orientation(b"not an image at all"), 1);
        assert_eq!(read_orientation(&[]), 1);
    }
}
