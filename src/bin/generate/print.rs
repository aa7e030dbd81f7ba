use playlist::catalog::Library;

/// `steps` holds `(song, reward, similarity)` for every song after the first.
pub fn print_playlist(library: &Library, playlist: &[usize], steps: &[(usize, f32, f32)]) {
    println!("--- Playlist ({} songs)", playlist.len());

    if let Some(song) = playlist.first().and_then(|first| library.song(*first)) {
        println!("{:>3}. {}", 1, song);
    }

    for (ndx, (song, reward, similarity)) in steps.iter().enumerate() {
        let Some(song) = library.song(*song) else {
            continue;
        };

        println!(
            "{:>3}. {} | reward {:+.3} (similarity {:.3})",
            ndx + 2,
            song,
            reward,
            similarity
        );
    }

    let total: f32 = steps.iter().map(|(_, reward, _)| reward).sum();
    let mean = if steps.is_empty() {
        0.0
    } else {
        total / steps.len() as f32
    };

    println!("{:8}: {:.3}", "Total", total);
    println!("{:8}: {:.3}", "Mean", mean);
}
