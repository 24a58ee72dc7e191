#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use std::path::Path;

/// A `mediasort` command running inside `temp`, logging to `temp/log.txt`.
pub fn mediasort_cmd(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mediasort").unwrap();
    cmd.current_dir(temp.path())
        .arg("--log-file")
        .arg(temp.path().join("log.txt"));
    cmd
}

/// An input directory inside `temp` with nothing in it yet.
pub fn setup_input_dir(temp: &TempDir) -> ChildPath {
    let input = temp.child("input");
    input.create_dir_all().unwrap();
    input
}

/// Checkerboard-ish test picture; `variant` changes the layout.
pub fn test_picture(variant: u32) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(96, 64, |x, y| {
        let bright = match variant {
            0 => x < 48,
            1 => y < 32,
            _ => (x / 24 + y / 16) % 2 == 0,
        };
        if bright { Rgb([220, 200, 180]) } else { Rgb([30, 40, 50]) }
    });
    DynamicImage::ImageRgb8(img)
}

pub fn write_jpeg(path: &Path, variant: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    test_picture(variant).save(path).unwrap();
}
