//! Opaque identifiers for tickets and invoices.
//!
//! Codes are drawn from the OS random source over the Crockford base-32
//! alphabet (no `I`, `L`, `O`, `U`), 16 characters = 80 bits. Uniqueness is
//! finally enforced by the `UNIQUE` constraints on `order_details.ticket_code`
//! and `orders.invoice_id`; the order service regenerates and retries when one
//! of them trips.

use rand::rngs::OsRng;
use rand::Rng;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

pub const CODE_LENGTH: usize = 16;
pub const INVOICE_PREFIX: &str = "INV-";

pub trait CodeGenerator: Send + Sync {
    fn ticket_code(&self) -> String;
    fn invoice_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl RandomCodeGenerator {
    fn random_code<R: Rng>(rng: &mut R) -> String {
        (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn ticket_code(&self) -> String {
        Self::random_code(&mut OsRng)
    }

    fn invoice_id(&self) -> String {
        format!("{INVOICE_PREFIX}{}", Self::random_code(&mut OsRng))
    }
}
