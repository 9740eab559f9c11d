use image::{DynamicImage, ImageBuffer};

use crate::renderer::gltf::scene::{Image, SceneGraph};
use crate::renderer::gpu::{
    Gpu, PixelFormat, SampleType, TextureFilter, TextureUpload, TextureWrap,
};

pub fn pixel_format(components: u8) -> PixelFormat {
    match components {
        1 => PixelFormat::Red,
        2 => PixelFormat::Rg,
        3 => PixelFormat::Rgb,
        _ => PixelFormat::Rgba,
    }
}

pub fn sample_type(bits: u8) -> SampleType {
    match bits {
        16 => SampleType::UnsignedShort,
        _ => SampleType::UnsignedByte,
    }
}

/// Creates a texture object for every texture whose source image exists, in
/// texture order. Textures sharing an image get separate texture objects.
pub fn upload_textures<G: Gpu>(gpu: &mut G, graph: &SceneGraph) -> Vec<Option<u32>> {
    graph
        .textures
        .iter()
        .enumerate()
        .map(|(texture_index, texture)| {
            let source = texture.source?;
            let Some(image) = graph.images.get(source) else {
                log::warn!("texture {texture_index} refers to missing image {source}");
                return None;
            };
            upload_image(gpu, image, texture_index)
        })
        .collect()
}

/// Expands the image to 8 bit RGBA. 16 bit samples are scaled down, and one
/// or two channel images come out grey (with alpha).
///
/// Returns None if the pixel data is too short for the image's dimensions.
pub fn rgba8_pixels(image: &Image) -> Option<Vec<u8>> {
    let (width, height) = (image.width, image.height);
    let pixels = || image.pixels.clone();
    let samples = || {
        image
            .pixels
            .chunks_exact(2)
            .map(|sample| u16::from_ne_bytes([sample[0], sample[1]]))
            .collect::<Vec<u16>>()
    };
    let decoded = match (pixel_format(image.components), sample_type(image.bits)) {
        (PixelFormat::Rgba, SampleType::UnsignedByte) => {
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, pixels())?)
        }
        (PixelFormat::Red, SampleType::UnsignedByte) => {
            DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, pixels())?)
        }
        (PixelFormat::Rg, SampleType::UnsignedByte) => {
            DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, pixels())?)
        }
        (PixelFormat::Rgb, SampleType::UnsignedByte) => {
            DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, pixels())?)
        }
        (PixelFormat::Red, SampleType::UnsignedShort) => {
            DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, samples())?)
        }
        (PixelFormat::Rg, SampleType::UnsignedShort) => {
            DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, samples())?)
        }
        (PixelFormat::Rgb, SampleType::UnsignedShort) => {
            DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, samples())?)
        }
        (PixelFormat::Rgba, SampleType::UnsignedShort) => {
            DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, samples())?)
        }
    };
    Some(decoded.into_rgba8().into_raw())
}

fn upload_image<G: Gpu>(gpu: &mut G, image: &Image, texture_index: usize) -> Option<u32> {
    if image.pixels.is_empty() || image.width == 0 || image.height == 0 {
        log::warn!("texture {texture_index} has no pixel data, not uploaded");
        return None;
    }
    let Some(rgba) = rgba8_pixels(image) else {
        log::warn!(
            "texture {texture_index}: {} bytes is too little for a {}x{} image, not uploaded",
            image.pixels.len(),
            image.width,
            image.height,
        );
        return None;
    };
    let texture = gpu.create_texture();
    gpu.upload_texture(
        texture,
        &TextureUpload {
            width: image.width,
            height: image.height,
            format: PixelFormat::Rgba,
            sample_type: SampleType::UnsignedByte,
            filter: TextureFilter::Linear,
            wrap: TextureWrap::Repeat,
            pixels: &rgba,
        },
    );
    log::debug!(
        "texture {texture_index}: texture object {texture}, {}x{}, {} channels at {} bits",
        image.width,
        image.height,
        image.components,
        image.bits,
    );
    Some(texture)
}
