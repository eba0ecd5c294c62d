// Display cleanup for stored identifiers: "ai_coding_agents" -> "Ai Coding
// Agents". Mirrors how the dashboard has always shown category and product
// slugs, including the plain first-letter capitalization.
pub fn clean_label(text: &str) -> String {
  text
    .split('_')
    .flat_map(|part| part.split(' '))
    .filter(|word| !word.is_empty())
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}
