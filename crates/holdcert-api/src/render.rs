//! # Artifact Rendering
//!
//! [`ArtifactRenderer`] turns a certificate and its linked records into the
//! bytes that get hashed, signed and stored. [`PdfRenderer`] writes a
//! single-page PDF 1.4 document of text lines in Helvetica. When no template
//! resolves, it falls back to a generic heading.

use thiserror::Error;

use holdcert_state::Certificate;

use crate::collaborators::{ClientRecord, InvestmentRecord, TemplateRecord};

/// Rendering failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Everything a renderer may print.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// The certificate being issued.
    pub certificate: &'a Certificate,
    /// Artifact version being produced.
    pub version: u32,
    /// Holder.
    pub client: &'a ClientRecord,
    /// Holding.
    pub investment: &'a InvestmentRecord,
    /// Resolved template, if any.
    pub template: Option<&'a TemplateRecord>,
}

/// Produces artifact bytes.
pub trait ArtifactRenderer: Send + Sync {
    /// MIME type of the output.
    fn content_type(&self) -> &'static str;

    /// File extension of the output, without the dot.
    fn extension(&self) -> &'static str;

    /// Render one artifact.
    fn render(&self, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError>;
}

const GENERIC_TITLE: &str = "Certificate of Holding";

/// Single-page PDF text renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    fn lines(ctx: &RenderContext<'_>) -> Vec<String> {
        let c = ctx.certificate;
        let title = ctx
            .template
            .map(|t| t.title.as_str())
            .unwrap_or(GENERIC_TITLE);
        let mut lines = vec![
            title.to_string(),
            String::new(),
            format!("Certificate No: {}", c.certificate_number),
            format!("Type: {}", c.certificate_type),
            format!("Version: {}", ctx.version),
            String::new(),
            format!("Holder: {}", ctx.client.display_name),
            format!("Client ID: {}", c.client_id),
            format!("Investment: {} ({})", ctx.investment.product_name, c.investment_id),
            format!("Number of shares: {}", c.number_of_shares),
            format!("Share price: {}", c.share_price),
        ];
        if let Some(amount) = &c.investment_amount {
            lines.push(format!("Investment amount: {amount}"));
        }
        lines.push(String::new());
        lines.push(format!("Issue date: {}", c.issue_date));
        lines.push(format!("Expiry date: {}", c.expiry_date));
        if let Some(footer) = ctx.template.and_then(|t| t.footer.as_deref()) {
            lines.push(String::new());
            lines.push(footer.to_string());
        }
        lines
    }
}

fn escape_pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(lines: &[String]) -> String {
    let mut stream = String::from("BT\n/F1 18 Tf\n72 760 Td\n");
    for (i, line) in lines.iter().enumerate() {
        if i == 1 {
            stream.push_str("/F1 11 Tf\n");
        }
        stream.push_str(&format!("({}) Tj\n0 -18 Td\n", escape_pdf_text(line)));
    }
    stream.push_str("ET\n");
    stream
}

impl ArtifactRenderer for PdfRenderer {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError> {
        let stream = content_stream(&Self::lines(ctx));
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
            format!("<< /Length {} >>\nstream\n{stream}endstream", stream.len()),
        ];

        let mut pdf = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
        }
        let xref_at = pdf.len();
        pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for off in offsets {
            pdf.push_str(&format!("{off:010} 00000 n \n"));
        }
        pdf.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        ));
        Ok(pdf.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use holdcert_core::{
        CertificateId, ClientId, DecimalAmount, InvestmentId, TemplateId, Timestamp, YearMonth,
    };
    use holdcert_state::{CertificateNumber, CertificateType, NewCertificate, TransitionEvidence};

    fn fixture() -> (Certificate, ClientRecord, InvestmentRecord) {
        let client = ClientRecord {
            id: ClientId::new("C-1").unwrap(),
            display_name: "Ada (Holdings) Ltd".into(),
            email: "ada@example.com".into(),
        };
        let investment = InvestmentRecord {
            id: InvestmentId::new("I-1").unwrap(),
            client_id: client.id.clone(),
            product_name: "Growth Fund".into(),
            amount: None,
        };
        let draft = NewCertificate {
            certificate_type: CertificateType::Unit,
            investment_id: investment.id.clone(),
            client_id: client.id.clone(),
            template_id: None,
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            investment_amount: Some(DecimalAmount::new("500").unwrap()),
            number_of_shares: 50,
            share_price: DecimalAmount::new("10").unwrap(),
        };
        let number =
            CertificateNumber::new(CertificateType::Unit, YearMonth::parse("202601").unwrap(), 3)
                .unwrap();
        let ev = TransitionEvidence::by("t").at(Timestamp::parse("2026-01-01T00:00:00Z").unwrap());
        (
            Certificate::issue(CertificateId::new(), number, draft, &ev),
            client,
            investment,
        )
    }

    #[test]
    fn renders_pdf_with_escaped_text_and_valid_trailer() {
        let (cert, client, inv) = fixture();
        let ctx = RenderContext {
            certificate: &cert,
            version: 1,
            client: &client,
            investment: &inv,
            template: None,
        };
        let bytes = PdfRenderer.render(&ctx).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("UNT-202601-0003"));
        assert!(text.contains("Ada \\(Holdings\\) Ltd"));
        assert!(text.contains(GENERIC_TITLE));

        let xref_at: usize = text
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!(text[xref_at..].starts_with("xref"));
    }

    #[test]
    fn template_title_and_footer_are_used() {
        let (cert, client, inv) = fixture();
        let template = TemplateRecord {
            id: TemplateId::new("T-1").unwrap(),
            title: "Unit Holding Certificate".into(),
            default_for: Some(CertificateType::Unit),
            footer: Some("Issued by the Registrar".into()),
        };
        let ctx = RenderContext {
            certificate: &cert,
            version: 2,
            client: &client,
            investment: &inv,
            template: Some(&template),
        };
        let text = String::from_utf8(PdfRenderer.render(&ctx).unwrap()).unwrap();
        assert!(text.contains("Unit Holding Certificate"));
        assert!(text.contains("Issued by the Registrar"));
        assert!(text.contains("Version: 2"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let (cert, client, inv) = fixture();
        let ctx = RenderContext {
            certificate: &cert,
            version: 1,
            client: &client,
            investment: &inv,
            template: None,
        };
        assert_eq!(PdfRenderer.render(&ctx).unwrap(), PdfRenderer.render(&ctx).unwrap());
    }
}
