//! Email Templates
//!
//! Inline-styled HTML bodies for the two order emails. Every interpolated
//! value is HTML-escaped; amounts render as `R$ 0.00`.

use std::fmt::Write;

use rust_decimal::Decimal;

use crate::model::{Address, OrderDetails};

pub const STORE_NAME: &str = "Spazio Parts";
pub const CONFIRMATION_SUBJECT: &str = "Confirmação de Pedido - Spazio Parts";
pub const OWNER_SUBJECT: &str = "Nova Venda Realizada - Spazio Parts";

/// A rendered message, ready for any provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Format a monetary amount the way the storefront displays it
pub fn money(amount: Decimal) -> String {
    format!("R$ {:.2}", amount.round_dp(2))
}

/// Minimal HTML escaping for text and attribute positions
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const TH: &str = "padding: 8px; text-align: left; border: 1px solid #ddd;";
const TD: &str = "padding: 8px; border: 1px solid #ddd;";
const PANEL: &str = "background-color: #e9ecef; padding: 15px; border-radius: 5px; margin: 20px 0;";

/// Buyer-facing confirmation
pub fn order_confirmation(order: &OrderDetails) -> RenderedEmail {
    let mut html = String::new();
    html.push_str(r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">"#);
    html.push_str(r#"<h1 style="color: #333;">Confirmação de Pedido</h1>"#);
    let _ = write!(html, "<p>Olá {},</p>", escape(&order.name));
    html.push_str("<p>Seu pedido foi recebido com sucesso! Abaixo estão os detalhes:</p>");

    html.push_str(r#"<h2 style="color: #666;">Produtos:</h2>"#);
    html.push_str(r#"<table style="width: 100%; border-collapse: collapse;">"#);
    let _ = write!(
        html,
        r#"<tr style="background-color: #f5f5f5;"><th style="{TH}">Produto</th><th style="{TH}">Quantidade</th><th style="{TH}">Preço</th></tr>"#
    );
    for item in &order.products {
        let _ = write!(
            html,
            r#"<tr><td style="{TD}">{}</td><td style="{TD}">{}</td><td style="{TD}">{}</td></tr>"#,
            escape(&item.name),
            item.quantity,
            money(item.price),
        );
    }
    html.push_str("</table>");

    html.push_str(r#"<h2 style="color: #666;">Frete:</h2>"#);
    let _ = write!(
        html,
        "<p>{} - {}</p>",
        escape(&order.shipping.name),
        money(order.shipping.price)
    );

    html.push_str(r#"<h2 style="color: #666;">Endereço de Entrega:</h2>"#);
    let _ = write!(html, "<p>{}</p>", address_block(&order.address));

    html.push_str(r#"<h2 style="color: #666;">Total do Pedido:</h2>"#);
    let _ = write!(
        html,
        r#"<p style="font-size: 1.2em; font-weight: bold;">{}</p>"#,
        money(order.total)
    );

    html.push_str(r#"<p style="margin-top: 20px;">Agradecemos sua compra!</p>"#);
    html.push_str("<p>Em caso de dúvidas, entre em contato conosco.</p>");
    let _ = write!(
        html,
        r#"<div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd;"><p style="color: #666; font-size: 0.9em;">{STORE_NAME}</p></div>"#
    );
    html.push_str("</div>");

    RenderedEmail {
        subject: CONFIRMATION_SUBJECT.into(),
        html,
    }
}

/// Operator-facing sale notice
pub fn owner_notification(order: &OrderDetails) -> RenderedEmail {
    let mut html = String::new();
    html.push_str(r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">"#);
    html.push_str(
        r#"<h1 style="color: #333; background-color: #f8f9fa; padding: 20px; border-radius: 5px;">Nova Venda Realizada!</h1>"#,
    );

    let _ = write!(
        html,
        r#"<div style="{PANEL}"><h2 style="color: #333; margin-top: 0;">Dados do Cliente</h2><p><strong>Nome:</strong> {}</p><p><strong>Email:</strong> {}</p><p><strong>Telefone:</strong> {}</p></div>"#,
        escape(&order.name),
        escape(&order.email),
        escape(&order.phone),
    );

    html.push_str(r#"<h2 style="color: #333;">Produtos Vendidos:</h2>"#);
    html.push_str(r#"<table style="width: 100%; border-collapse: collapse; margin-bottom: 20px;">"#);
    let _ = write!(
        html,
        r#"<tr style="background-color: #f8f9fa;"><th style="{TH}">Produto</th><th style="{TH}">Quantidade</th><th style="{TH}">Preço Unit.</th><th style="{TH}">Subtotal</th></tr>"#
    );
    for item in &order.products {
        let _ = write!(
            html,
            r#"<tr><td style="{TD}">{}</td><td style="{TD}">{}</td><td style="{TD}">{}</td><td style="{TD}">{}</td></tr>"#,
            escape(&item.name),
            item.quantity,
            money(item.price),
            money(item.subtotal()),
        );
    }
    html.push_str("</table>");

    let _ = write!(
        html,
        r#"<div style="{PANEL}"><h2 style="color: #333; margin-top: 0;">Detalhes do Frete</h2><p><strong>Transportadora:</strong> {}</p><p><strong>Valor do Frete:</strong> {}</p></div>"#,
        escape(&order.shipping.name),
        money(order.shipping.price),
    );

    let _ = write!(
        html,
        r#"<div style="{PANEL}"><h2 style="color: #333; margin-top: 0;">Endereço de Entrega</h2><p>{}</p></div>"#,
        address_block(&order.address)
    );

    let _ = write!(
        html,
        r#"<div style="background-color: #28a745; color: white; padding: 20px; border-radius: 5px; margin: 20px 0;"><h2 style="margin-top: 0;">Valor Total da Venda</h2><p style="font-size: 1.5em; font-weight: bold; margin: 0;">{}</p></div>"#,
        money(order.total)
    );

    let _ = write!(
        html,
        r#"<div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #dee2e6;"><p style="color: #666; font-size: 0.9em;">Este é um email automático do sistema de vendas da {STORE_NAME}.</p></div>"#
    );
    html.push_str("</div>");

    RenderedEmail {
        subject: OWNER_SUBJECT.into(),
        html,
    }
}

fn address_block(address: &Address) -> String {
    let mut block = format!("{}, {}", escape(&address.street), escape(&address.number));
    if let Some(complement) = address.complement.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(block, " - {}", escape(complement));
    }
    let _ = write!(
        block,
        "<br>{}<br>{} - {}<br>CEP: {}",
        escape(&address.neighborhood),
        escape(&address.city),
        escape(&address.state),
        escape(&address.cep),
    );
    block
}
