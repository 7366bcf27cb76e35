// ルートB認証情報
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
/// 認証情報
pub struct Credentials {
    pub id: Id,
    pub password: Password,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id.to_string())
            .field("password", &"############")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
/// ID
pub struct Id([char; 32]);
impl std::str::FromStr for Id {
    type Err = String;
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .collect::<Vec<char>>()
            .try_into()
            .map(Self)
            .map_err(|_| "IDは32文字固定長です".to_string())
    }
}
impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().collect::<String>())
    }
}

#[derive(Clone, PartialEq, Eq)]
/// パスワード
pub struct Password([char; 12]);
impl std::str::FromStr for Password {
    type Err = String;
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .collect::<Vec<char>>()
            .try_into()
            .map(Self)
            .map_err(|_| "PASSWORDは12文字固定長です".to_string())
    }
}
impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().collect::<String>())
    }
}

#[cfg(test)]
pub(crate) fn test_credentials() -> Credentials {
    Credentials {
        id: "0123456789ABCDEF0123456789ABCDEF".parse().unwrap(),
        password: "PASSWORD1234".parse().unwrap(),
    }
}

#[test]
fn test1() {
    use std::str::FromStr;

    assert!(Id::from_str("0123456789ABCDEF0123456789ABCDEF").is_ok());
    assert!(Id::from_str("0123456789ABCDEF").is_err());
    assert!(Password::from_str("PASSWORD1234").is_ok());
    assert!(Password::from_str("PASSWORD12345").is_err());

    let credentials = test_credentials();
    assert_eq!(credentials.password.to_string(), "PASSWORD1234");
    assert!(!format!("{:?}", credentials).contains("PASSWORD1234"));
}
