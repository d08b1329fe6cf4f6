//! 二维码生成
//!
//! 把访问地址编码成 PNG 二维码并内联为 data URL，
//! 方便手机扫码直接打开首页。

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

/// 生成给定文本的二维码，返回可直接放进 `<img src>` 的 data URL
pub fn qr_data_url(text: &str) -> anyhow::Result<String> {
    let code = QrCode::new(text.as_bytes()).context("QR encoding failed")?;
    let image = code.render::<Luma<u8>>().min_dimensions(240, 240).build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .context("PNG encoding failed")?;

    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(&png)
    ))
}
