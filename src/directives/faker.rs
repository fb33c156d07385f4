//! `{% faker <type> %}`: synthetic values

use chrono::Utc;
use fake::faker::address::en::*;
use fake::faker::boolean::en::*;
use fake::faker::company::en::*;
use fake::faker::creditcard::en::*;
use fake::faker::filesystem::en::*;
use fake::faker::internet::en::*;
use fake::faker::lorem::en::*;
use fake::faker::name::en::*;
use fake::faker::phone_number::en::*;
use fake::Fake;
use futures::future::BoxFuture;
use rand::Rng;

use super::{Directive, DirectiveContext};
use crate::errors::{ReqchainError, Result};

const CURRENCIES: &[(&str, &str, &str)] = &[
    ("USD", "US Dollar", "$"),
    ("EUR", "Euro", "€"),
    ("GBP", "Pound Sterling", "£"),
    ("JPY", "Yen", "¥"),
    ("CHF", "Swiss Franc", "CHF"),
    ("CAD", "Canadian Dollar", "$"),
    ("AUD", "Australian Dollar", "$"),
    ("INR", "Indian Rupee", "₹"),
];

const COLORS: &[&str] = &[
    "red", "green", "blue", "orange", "purple", "teal", "black", "white", "yellow", "magenta",
];

const PRODUCT_ADJECTIVES: &[&str] = &["Ergonomic", "Rustic", "Sleek", "Handmade", "Refined", "Practical"];
const PRODUCT_MATERIALS: &[&str] = &["Steel", "Wooden", "Cotton", "Granite", "Plastic", "Rubber"];
const PRODUCT_NOUNS: &[&str] = &["Chair", "Keyboard", "Table", "Shoes", "Gloves", "Lamp", "Bike"];

/// Every generator name accepted by `faker`
pub const GENERATORS: &[&str] = &[
    // identifiers and time
    "guid", "uuid", "timestamp", "isoTimestamp", "randomUUID", "randomInt", "randomBoolean",
    // person
    "randomFullName", "randomFirstName", "randomLastName", "randomNamePrefix", "randomNameSuffix",
    "randomJobTitle", "randomPhoneNumber",
    // internet
    "randomEmail", "randomExampleEmail", "randomUserName", "randomPassword", "randomDomainSuffix",
    "randomIP", "randomIPV6", "randomMACAddress", "randomUserAgent", "randomUrl",
    // location
    "randomCity", "randomStreetName", "randomStreetAddress", "randomZipCode", "randomState",
    "randomCountry", "randomCountryCode", "randomLatitude", "randomLongitude",
    // company
    "randomCompanyName", "randomCompanySuffix", "randomIndustry", "randomCatchPhrase", "randomBs",
    // finance and commerce
    "randomCreditCardNumber", "randomCurrencyCode", "randomCurrencyName", "randomCurrencySymbol",
    "randomPrice", "randomColor", "randomProductName",
    // lorem
    "randomWord", "randomWords", "randomLoremSentence", "randomLoremParagraph",
    // files
    "randomFileName", "randomFileExt",
];

pub struct FakerDirective;

impl Directive for FakerDirective {
    fn name(&self) -> &'static str {
        "faker"
    }

    fn evaluate<'a>(&'a self, args: &'a [String], _ctx: &'a DirectiveContext<'a>) -> BoxFuture<'a, Result<String>> {
        let result = match args.first() {
            Some(kind) => generate(kind),
            None => Err(ReqchainError::directive("faker", "missing generator name")),
        };
        Box::pin(async move { result })
    }
}

fn pick<T: Copy>(items: &[T]) -> T {
    items[rand::rng().random_range(0..items.len())]
}

/// Produce one value for the named generator
pub fn generate(kind: &str) -> Result<String> {
    let value = match kind {
        "guid" | "uuid" | "randomUUID" => uuid::Uuid::new_v4().to_string(),
        "timestamp" => Utc::now().timestamp().to_string(),
        "isoTimestamp" => Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "randomInt" => rand::rng().random_range(0..=1000).to_string(),
        "randomBoolean" => Boolean(50).fake::<bool>().to_string(),

        "randomFullName" => Name().fake(),
        "randomFirstName" => FirstName().fake(),
        "randomLastName" => LastName().fake(),
        "randomNamePrefix" => Title().fake(),
        "randomNameSuffix" => Suffix().fake(),
        "randomJobTitle" => Profession().fake(),
        "randomPhoneNumber" => PhoneNumber().fake(),

        "randomEmail" => FreeEmail().fake(),
        "randomExampleEmail" => SafeEmail().fake(),
        "randomUserName" => Username().fake(),
        "randomPassword" => Password(8..20).fake(),
        "randomDomainSuffix" => DomainSuffix().fake(),
        "randomIP" => IPv4().fake(),
        "randomIPV6" => IPv6().fake(),
        "randomMACAddress" => MACAddress().fake(),
        "randomUserAgent" => UserAgent().fake(),
        "randomUrl" => {
            let word: String = Word().fake();
            let suffix: String = DomainSuffix().fake();
            format!("https://{}.{}", word.to_lowercase(), suffix)
        }

        "randomCity" => CityName().fake(),
        "randomStreetName" => StreetName().fake(),
        "randomStreetAddress" => {
            let street: String = StreetName().fake();
            let number: u32 = (1..9999u32).fake();
            format!("{} {}", number, street)
        }
        "randomZipCode" => ZipCode().fake(),
        "randomState" => StateName().fake(),
        "randomCountry" => CountryName().fake(),
        "randomCountryCode" => CountryCode().fake(),
        "randomLatitude" => format!("{:.6}", Latitude().fake::<f64>()),
        "randomLongitude" => format!("{:.6}", Longitude().fake::<f64>()),

        "randomCompanyName" => CompanyName().fake(),
        "randomCompanySuffix" => CompanySuffix().fake(),
        "randomIndustry" => Industry().fake(),
        "randomCatchPhrase" => CatchPhrase().fake(),
        "randomBs" => Buzzword().fake(),

        "randomCreditCardNumber" => CreditCardNumber().fake(),
        "randomCurrencyCode" => pick(CURRENCIES).0.to_string(),
        "randomCurrencyName" => pick(CURRENCIES).1.to_string(),
        "randomCurrencySymbol" => pick(CURRENCIES).2.to_string(),
        "randomPrice" => format!("{:.2}", rand::rng().random_range(1.0..1000.0f64)),
        "randomColor" => pick(COLORS).to_string(),
        "randomProductName" => format!(
            "{} {} {}",
            pick(PRODUCT_ADJECTIVES),
            pick(PRODUCT_MATERIALS),
            pick(PRODUCT_NOUNS)
        ),

        "randomWord" => Word().fake(),
        "randomWords" => Words(3..8).fake::<Vec<String>>().join(" "),
        "randomLoremSentence" => Sentence(5..12).fake(),
        "randomLoremParagraph" => Paragraph(3..7).fake(),

        "randomFileName" => FileName().fake(),
        "randomFileExt" => FileExtension().fake(),

        other => {
            return Err(ReqchainError::directive(
                "faker",
                format!("unknown generator '{}'", other),
            ))
        }
    };
    Ok(value)
}
