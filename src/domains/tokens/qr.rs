//! Render del payload de canje como código QR

use anyhow::{Context, Result};
use image::Luma;
use qrcode::QrCode;
use std::io::Cursor;

/// Configuración del render
pub struct QrConfig {
    /// Tamaño máximo del QR en píxeles
    pub size: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self { size: 800 }
    }
}

/// Codifica payloads como PNG escaneables. Leer el QR de vuelta es asunto
/// del cliente que escanea; aquí sólo se produce la imagen.
pub struct QrRenderer {
    pub config: QrConfig,
}

impl QrRenderer {
    pub fn new(config: QrConfig) -> Self {
        Self { config }
    }

    pub fn render_png(&self, payload: &str) -> Result<Vec<u8>> {
        let qr = QrCode::new(payload.as_bytes()).context("Error al crear QR code")?;

        let qr_image = qr
            .render::<Luma<u8>>()
            .max_dimensions(self.config.size, self.config.size)
            .build();

        let mut buffer = Cursor::new(Vec::new());
        qr_image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .context("Error al escribir imagen PNG")?;

        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_png_produces_png_bytes() {
        let renderer = QrRenderer::new(QrConfig::default());
        let bytes = renderer
            .render_png("CANJE:COUPON:abc.def.ghi")
            .unwrap();

        // Firma PNG
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
        assert!(bytes.len() > 100);
    }

    #[test]
    fn test_default_config_size() {
        assert_eq!(QrConfig::default().size, 800);
    }
}
