/// English stop list used by key-term extraction. Function words carry no
/// competitive signal and would otherwise dominate raw frequency ranking.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "yours", "all", "any", "can", "had",
    "has", "have", "him", "his", "her", "hers", "how", "its", "may", "our", "ours", "out", "she",
    "was", "were", "who", "whom", "why", "will", "with", "this", "that", "these", "those", "they",
    "them", "their", "theirs", "then", "than", "there", "here", "where", "when", "what", "which",
    "while", "would", "could", "should", "shall", "might", "must", "been", "being", "because",
    "before", "after", "above", "below", "between", "into", "through", "during", "about",
    "against", "again", "further", "once", "only", "over", "under", "same", "some", "such",
    "very", "too", "more", "most", "other", "others", "own", "each", "few", "both", "does",
    "did", "doing", "from", "off", "until", "upon", "also", "just", "like", "via", "per",
    "get", "got", "one", "two", "use", "used", "using", "way", "well", "even", "ever",
    "every", "however", "itself", "let", "many", "much", "now", "often", "since", "still",
    "take", "make", "made", "see", "say", "said", "want", "need", "come", "know", "yet",
];
