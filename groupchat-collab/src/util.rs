use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

lazy_static! {
    /// An E.164 phone number, like +12702900802
    pub static ref PHONE_NUMBER_REGEX: Regex = Regex::new(r"^\+[1-9]\d{6,14}$").unwrap();
    /// Keys are typed by hand in text messages, so they are short and have no spaces
    pub static ref PLAYLIST_KEY_REGEX: Regex = Regex::new(r"^[\w.@+-]{3,12}$").unwrap();
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}
