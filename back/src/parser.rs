//! Turns a rendered listing page into a [`Snapshot`].
//!
//! Every product on the page lives in its own `.list_block`. Blocks that
//! cannot yield a link are skipped; every other missing piece resolves to a
//! fallback so the detector only ever sees complete [`Product`] records.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::product::{Product, Snapshot};

const BLOCK: &str = ".list_block";
const ADD_TO_CART: &str = ".ga_bn_btn_addcart";
const OUT_OF_STOCK_MARKERS: [&str; 3] = ["out of stock", "sold out", "notify me"];

pub const UNNAMED_PRODUCT: &str = "Unnamed product";

pub fn parse_listing(html: &str, page_url: &Url) -> Snapshot {
    let document = Html::parse_document(html);
    let mut snapshot = Snapshot::new();

    let Ok(block_selector) = Selector::parse(BLOCK) else {
        return snapshot;
    };

    for block in document.select(&block_selector) {
        match parse_block(block, page_url) {
            Some(product) => snapshot.insert(product),
            None => tracing::trace!("skipping product block without a usable link"),
        }
    }

    tracing::debug!(products = snapshot.len(), "parsed listing page");
    snapshot
}

fn parse_block(block: ElementRef<'_>, page_url: &Url) -> Option<Product> {
    let link_tag = first_match(block, "a[href]")?;
    let link = resolve(page_url, link_tag.value().attr("href")?)?;

    // A titled anchor wins even when its title is blank; link text is only
    // used when no anchor carries a title at all.
    let titled = match first_match(block, "a[title]") {
        Some(a) => a.value().attr("title").map(collapse_whitespace).unwrap_or_default(),
        None => element_text(link_tag),
    };

    let name = Some(titled)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            first_match(block, "img[alt]")
                .and_then(|img| img.value().attr("alt"))
                .map(collapse_whitespace)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| UNNAMED_PRODUCT.to_string());

    let has_cart_button = first_match(block, ADD_TO_CART).is_some();
    let block_text = element_text(block).to_lowercase();
    let marked_out = OUT_OF_STOCK_MARKERS
        .iter()
        .any(|marker| block_text.contains(marker));

    let image = first_match(block, "img[src]")
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| resolve(page_url, src))
        .unwrap_or_default();

    Some(Product {
        name,
        in_stock: has_cart_button && !marked_out,
        link,
        image,
    })
}

fn first_match<'a>(block: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    block.select(&selector).next()
}

fn resolve(page_url: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    page_url.join(href).ok().map(String::from)
}

fn element_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
