pub mod aerogarden;
