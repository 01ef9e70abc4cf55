use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const EMBEDDED_PRODUCTS: &str = include_str!("../data/products.json");
const EMBEDDED_INDUSTRIES: &str = include_str!("../data/industries.json");
const EMBEDDED_CARDS: &str = include_str!("../data/cards.json");

const MAX_COMPONENTS_PER_INDUSTRY: usize = 2;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("industry `{slug}` needs one or two x-ray components, found {found}")]
    ComponentCount { slug: String, found: usize },
    #[error("component `{component}` must have positive width and height")]
    Dimensions { component: String },
    #[error("hotspot `{id}` appears more than once in component `{component}`")]
    DuplicateHotspot { component: String, id: String },
    #[error("hotspot `{id}` in component `{component}` has no points")]
    EmptyHotspot { component: String, id: String },
    #[error("hotspot `{id}` references unknown product `{sku}`")]
    UnknownProduct { id: String, sku: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Bond,
    Seal,
    Tape,
}

impl Category {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Bond => "bond",
            Self::Seal => "seal",
            Self::Tape => "tape",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bond" => Some(Self::Bond),
            "seal" => Some(Self::Seal),
            "tape" => Some(Self::Tape),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub category: Category,
    pub industry: Vec<String>,
    pub chemistry: String,
    pub image_url: String,
    pub is_active: bool,
}

impl Product {
    pub fn detail_url(&self) -> String {
        product_detail_url(self.category, &self.id)
    }
}

/// Read side of the product data service.
pub trait ProductSource {
    fn all_products(&self) -> &[Product];

    fn product_by_id(&self, id: &str) -> Option<&Product> {
        self.all_products().iter().find(|product| product.id == id)
    }

    fn active_products(&self) -> Vec<&Product> {
        self.all_products()
            .iter()
            .filter(|product| product.is_active)
            .collect()
    }

    fn products_for_industry(&self, slug: &str) -> Vec<&Product> {
        self.active_products()
            .into_iter()
            .filter(|product| product.industry.iter().any(|industry| industry == slug))
            .collect()
    }

    fn products_in_category(&self, category: Category) -> Vec<&Product> {
        self.active_products()
            .into_iter()
            .filter(|product| product.category == category)
            .collect()
    }
}

pub fn product_detail_url(category: Category, id: &str) -> String {
    format!("/products/{}/{id}", category.slug())
}

pub fn industry_url(slug: &str) -> String {
    format!("/industries/{slug}")
}

pub fn blog_url(slug: &str) -> String {
    format!("/blog/{slug}")
}

/// A position in a diagram's native pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Percentages of the diagram size, the unit overlays are placed in.
    pub fn normalized(self, width: f64, height: f64) -> (f64, f64) {
        (self.x / width * 100.0, self.y / height * 100.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub sku: String,
    pub name: String,
    pub blurb: String,
    pub detail_url: String,
    pub thumbnail_url: String,
}

impl ProductRef {
    pub fn from_product(product: &Product, blurb: impl Into<String>) -> Self {
        Self {
            sku: product.id.clone(),
            name: product.name.clone(),
            blurb: blurb.into(),
            detail_url: product.detail_url(),
            thumbnail_url: product.image_url.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HotspotTarget {
    Product(ProductRef),
    Experience(Experience),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: String,
    pub points: Vec<Point>,
    #[serde(flatten)]
    pub target: HotspotTarget,
}

impl Hotspot {
    pub fn title(&self) -> &str {
        match &self.target {
            HotspotTarget::Product(product) => &product.name,
            HotspotTarget::Experience(experience) => &experience.title,
        }
    }

    pub fn centroid(&self) -> Point {
        if self.points.is_empty() {
            return Point { x: 0.0, y: 0.0 };
        }

        let count = self.points.len() as f64;
        let (sum_x, sum_y) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(x, y), point| (x + point.x, y + point.y));

        Point {
            x: sum_x / count,
            y: sum_y / count,
        }
    }
}

/// One diagram variant: a normal and an x-ray rendering of the same
/// assembly, sharing one coordinate space.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XRayComponent {
    pub key: String,
    pub label: String,
    pub pre_src: String,
    pub post_src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg_overlay: Option<String>,
    pub width: f64,
    pub height: f64,
    pub hotspots: Vec<Hotspot>,
}

impl XRayComponent {
    pub fn normalize(&self, point: Point) -> (f64, f64) {
        point.normalized(self.width, self.height)
    }

    pub fn hotspot_index(&self, id: &str) -> Option<usize> {
        self.hotspots.iter().position(|hotspot| hotspot.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryData {
    pub slug: String,
    pub name: String,
    pub tagline: String,
    pub components: Vec<XRayComponent>,
}

impl IndustryData {
    pub fn validate(&self) -> Result<(), CatalogError> {
        let found = self.components.len();
        if !(1..=MAX_COMPONENTS_PER_INDUSTRY).contains(&found) {
            return Err(CatalogError::ComponentCount {
                slug: self.slug.clone(),
                found,
            });
        }

        for component in &self.components {
            if component.width <= 0.0 || component.height <= 0.0 {
                return Err(CatalogError::Dimensions {
                    component: component.key.clone(),
                });
            }

            let mut seen = HashSet::new();
            for hotspot in &component.hotspots {
                if !seen.insert(hotspot.id.as_str()) {
                    return Err(CatalogError::DuplicateHotspot {
                        component: component.key.clone(),
                        id: hotspot.id.clone(),
                    });
                }

                if hotspot.points.is_empty() {
                    return Err(CatalogError::EmptyHotspot {
                        component: component.key.clone(),
                        id: hotspot.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn component(&self, key: &str) -> Option<&XRayComponent> {
        self.components.iter().find(|component| component.key == key)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum TargetRecord {
    Product { sku: String, blurb: String },
    Experience(Experience),
}

#[derive(Deserialize)]
struct HotspotRecord {
    id: String,
    points: Vec<Point>,
    #[serde(flatten)]
    target: TargetRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentRecord {
    key: String,
    label: String,
    pre_src: String,
    post_src: String,
    #[serde(default)]
    svg_overlay: Option<String>,
    width: f64,
    height: f64,
    hotspots: Vec<HotspotRecord>,
}

#[derive(Deserialize)]
struct IndustryRecord {
    slug: String,
    name: String,
    #[serde(default)]
    tagline: String,
    components: Vec<ComponentRecord>,
}

fn resolve_hotspot(
    record: HotspotRecord,
    products: &dyn ProductSource,
) -> Result<Hotspot, CatalogError> {
    let target = match record.target {
        TargetRecord::Product { sku, blurb } => {
            let product = products
                .product_by_id(&sku)
                .ok_or_else(|| CatalogError::UnknownProduct {
                    id: record.id.clone(),
                    sku: sku.clone(),
                })?;
            HotspotTarget::Product(ProductRef::from_product(product, blurb))
        }
        TargetRecord::Experience(experience) => HotspotTarget::Experience(experience),
    };

    Ok(Hotspot {
        id: record.id,
        points: record.points,
        target,
    })
}

fn resolve_industry(
    record: IndustryRecord,
    products: &dyn ProductSource,
) -> Result<IndustryData, CatalogError> {
    let mut components = Vec::with_capacity(record.components.len());

    for component in record.components {
        let hotspots = component
            .hotspots
            .into_iter()
            .map(|hotspot| resolve_hotspot(hotspot, products))
            .collect::<Result<Vec<_>, _>>()?;

        components.push(XRayComponent {
            key: component.key,
            label: component.label,
            pre_src: component.pre_src,
            post_src: component.post_src,
            svg_overlay: component.svg_overlay,
            width: component.width,
            height: component.height,
            hotspots,
        });
    }

    let industry = IndustryData {
        slug: record.slug,
        name: record.name,
        tagline: record.tagline,
        components,
    };
    industry.validate()?;
    Ok(industry)
}

/// Card images arrive either as a bare URL or as `{ "src": url }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImageSource {
    Url(String),
    Object { src: String },
}

impl From<ImageSource> for String {
    fn from(value: ImageSource) -> Self {
        match value {
            ImageSource::Url(src) | ImageSource::Object { src } => src,
        }
    }
}

fn deserialize_image<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    ImageSource::deserialize(deserializer).map(String::from)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(deserialize_with = "deserialize_image")]
    pub image: String,
    #[serde(default)]
    pub theme: String,
}

/// Products, industries and marketing cards compiled into the binary.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticCatalog {
    products: Vec<Product>,
    industries: Vec<IndustryData>,
    cards: Vec<CardData>,
}

impl StaticCatalog {
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_PRODUCTS, EMBEDDED_INDUSTRIES, EMBEDDED_CARDS)
    }

    pub fn from_json(products: &str, industries: &str, cards: &str) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            products: serde_json::from_str(products)?,
            industries: Vec::new(),
            cards: serde_json::from_str(cards)?,
        };

        let records: Vec<IndustryRecord> = serde_json::from_str(industries)?;
        let resolved = records
            .into_iter()
            .map(|record| resolve_industry(record, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        catalog.industries = resolved;

        Ok(catalog)
    }

    pub fn industries(&self) -> &[IndustryData] {
        &self.industries
    }

    pub fn industry(&self, slug: &str) -> Option<&IndustryData> {
        self.industries.iter().find(|industry| industry.slug == slug)
    }

    pub fn service_cards(&self) -> &[CardData] {
        &self.cards
    }
}

impl ProductSource for StaticCatalog {
    fn all_products(&self) -> &[Product] {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_PRODUCT: &str = r#"[{
        "id": "p1", "name": "Product One", "shortName": "P1", "category": "BOND",
        "industry": ["marine"], "chemistry": "Epoxy", "imageUrl": "/p1.png", "isActive": true
    }]"#;

    fn industry_json(components: &str) -> String {
        format!(r#"[{{ "slug": "marine", "name": "Marine", "components": [{components}] }}]"#)
    }

    fn component_json(key: &str, hotspots: &str) -> String {
        format!(
            r#"{{ "key": "{key}", "label": "{key}", "preSrc": "/a.jpg", "postSrc": "/b.jpg",
                 "width": 200, "height": 100, "hotspots": [{hotspots}] }}"#
        )
    }

    const PRODUCT_HOTSPOT: &str =
        r#"{ "id": "hull", "points": [{"x": 0, "y": 0}, {"x": 100, "y": 50}], "product": {"sku": "p1", "blurb": "Hull bond"} }"#;

    #[test]
    fn embedded_catalog_loads_and_validates() {
        let catalog = StaticCatalog::embedded().expect("embedded data is valid");

        assert!(!catalog.all_products().is_empty());
        assert!(!catalog.service_cards().is_empty());
        let transportation = catalog
            .industry("transportation")
            .expect("transportation industry is embedded");
        assert_eq!(transportation.components.len(), 2);
        assert!(transportation.component("rv-bus").is_some());
    }

    #[test]
    fn hotspot_product_reference_is_resolved_from_catalog() {
        let catalog = StaticCatalog::from_json(
            ONE_PRODUCT,
            &industry_json(&component_json("boat", PRODUCT_HOTSPOT)),
            "[]",
        )
        .expect("valid industry");

        let hotspot = &catalog.industries()[0].components[0].hotspots[0];
        match &hotspot.target {
            HotspotTarget::Product(product) => {
                assert_eq!(product.sku, "p1");
                assert_eq!(product.name, "Product One");
                assert_eq!(product.detail_url, "/products/bond/p1");
                assert_eq!(product.thumbnail_url, "/p1.png");
            }
            HotspotTarget::Experience(_) => panic!("expected a product hotspot"),
        }
        assert_eq!(hotspot.title(), "Product One");
    }

    #[test]
    fn unknown_sku_is_rejected() {
        let hotspot = PRODUCT_HOTSPOT.replace("\"p1\"", "\"missing\"");
        let result = StaticCatalog::from_json(
            ONE_PRODUCT,
            &industry_json(&component_json("boat", &hotspot)),
            "[]",
        );

        assert!(matches!(result, Err(CatalogError::UnknownProduct { .. })));
    }

    #[test]
    fn industry_with_three_components_is_rejected() {
        let components = ["a", "b", "c"]
            .iter()
            .map(|key| component_json(key, ""))
            .collect::<Vec<_>>()
            .join(",");
        let result = StaticCatalog::from_json(ONE_PRODUCT, &industry_json(&components), "[]");

        assert!(matches!(
            result,
            Err(CatalogError::ComponentCount { found: 3, .. })
        ));
    }

    #[test]
    fn duplicate_hotspot_ids_are_rejected() {
        let hotspots = format!("{PRODUCT_HOTSPOT},{PRODUCT_HOTSPOT}");
        let result = StaticCatalog::from_json(
            ONE_PRODUCT,
            &industry_json(&component_json("boat", &hotspots)),
            "[]",
        );

        assert!(matches!(result, Err(CatalogError::DuplicateHotspot { .. })));
    }

    #[test]
    fn card_image_accepts_string_or_object() {
        let cards: Vec<CardData> = serde_json::from_str(
            r#"[
                { "id": "a", "title": "A", "description": "", "image": "/a.jpg" },
                { "id": "b", "title": "B", "description": "", "image": { "src": "/b.jpg" } }
            ]"#,
        )
        .expect("both image shapes decode");

        assert_eq!(cards[0].image, "/a.jpg");
        assert_eq!(cards[1].image, "/b.jpg");
    }

    #[test]
    fn inactive_products_are_filtered_from_listings() {
        let catalog = StaticCatalog::embedded().expect("embedded data is valid");

        assert!(catalog.product_by_id("sb-110").is_some());
        assert!(catalog
            .active_products()
            .iter()
            .all(|product| product.is_active));
        assert!(catalog
            .products_for_industry("construction")
            .iter()
            .all(|product| product.id != "sb-110"));
        assert!(catalog
            .products_in_category(Category::Tape)
            .iter()
            .all(|product| product.category == Category::Tape));
    }

    #[test]
    fn points_normalize_to_percentages() {
        let point = Point { x: 400.0, y: 225.0 };
        assert_eq!(point.normalized(1_600.0, 900.0), (25.0, 25.0));
    }

    #[test]
    fn centroid_averages_points() {
        let hotspot = Hotspot {
            id: "h".to_string(),
            points: vec![Point { x: 0.0, y: 0.0 }, Point { x: 10.0, y: 20.0 }],
            target: HotspotTarget::Experience(Experience {
                title: "T".to_string(),
                description: String::new(),
                icon: String::new(),
            }),
        };

        assert_eq!(hotspot.centroid(), Point { x: 5.0, y: 10.0 });
    }

    #[test]
    fn navigation_urls() {
        assert_eq!(product_detail_url(Category::Seal, "fs-100"), "/products/seal/fs-100");
        assert_eq!(industry_url("construction"), "/industries/construction");
        assert_eq!(blog_url("curing-101"), "/blog/curing-101");
        assert_eq!(Category::from_slug(" TAPE "), Some(Category::Tape));
        assert_eq!(Category::from_slug("glue"), None);
    }
}
